use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

pub fn init() -> Result<(), SetLoggerError> {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .add_filter_allow_str("compliroast")
            .build(),
        TerminalMode::Stdout,
        ColorChoice::Auto,
    )
}
