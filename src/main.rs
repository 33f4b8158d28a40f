use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use compliroast::{bot, config, log};

/// Compliment and roast chat bot
#[derive(Parser, Debug)]
struct Args {
    /// Config file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let conf = config::App::parse(&args.config).context("Failed to parse config")?;

    log::init().context("Failed to initialize logger")?;

    bot::run(conf).await.context("Unexpected error on bot")
}
