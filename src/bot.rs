use std::{ops::Deref, sync::Arc, time::Duration};

use poise::{serenity_prelude as serenity, ReplyHandle};

use crate::{
    config,
    selector::Selector,
    settings::{self, SettingsError},
    source::{self, Category, FallbackSource, HttpUpstream},
    state::{ConversationId, StateStore},
};

const DELETE_MSG_AFTER_SECS: Duration = Duration::from_secs(10);

const MORE_COMPLIMENT: &str = "more_compliment";
const MORE_ROAST: &str = "more_roast";

struct BotDataInner {
    selector: Selector,
}

impl BotDataInner {
    fn store(&self) -> &StateStore {
        self.selector.store()
    }
}

#[derive(Clone)]
struct BotData {
    inner: Arc<BotDataInner>,
}

impl BotData {
    fn new(selector: Selector) -> Self {
        Self {
            inner: Arc::new(BotDataInner { selector }),
        }
    }
}

impl Deref for BotData {
    type Target = BotDataInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

type InternalError = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, BotData, InternalError>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to build http client")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to create bot")]
    Creation(#[source] serenity::Error),
    #[error("failed to initialize bot")]
    Initialization(#[source] serenity::Error),
}

fn conversation(ctx: Context<'_>) -> ConversationId {
    ctx.channel_id().get()
}

/// Direct messages always count as admin. In a guild the member needs
/// ADMINISTRATOR or MANAGE_GUILD.
async fn is_admin(ctx: Context<'_>) -> bool {
    if ctx.guild_id().is_none() {
        return true;
    }

    ctx.author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|perms| perms.administrator() || perms.manage_guild())
}

fn escape(text: &str) -> String {
    serenity::MessageBuilder::new().push_safe(text).build()
}

fn another_buttons() -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(MORE_COMPLIMENT)
            .label("Another Compliment")
            .emoji('✨')
            .style(serenity::ButtonStyle::Primary),
        serenity::CreateButton::new(MORE_ROAST)
            .label("Another Roast")
            .emoji('🔥')
            .style(serenity::ButtonStyle::Danger),
    ])
}

fn category_embed(category: Category, text: &str) -> serenity::CreateEmbed {
    let title = match category {
        Category::Compliment => "✨ Compliment",
        Category::Roast => "🔥 Roast",
    };

    serenity::CreateEmbed::new()
        .title(title)
        .description(escape(text))
}

fn cooldown_title(left: Duration) -> String {
    format!(
        ":hotsprings: Please wait {:.1}s before the next one",
        left.as_secs_f64()
    )
}

fn cooldown_embed(left: Duration) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new().title(cooldown_title(left))
}

fn refusal_title(err: &SettingsError) -> String {
    match err {
        SettingsError::PermissionDenied(_) => format!(":no_entry: Sorry, {err}"),
        SettingsError::InvalidArgument(usage) => format!(":grey_question: Usage: `{usage}`"),
    }
}

async fn send_embedded_reply(
    ctx: Context<'_>,
    embed: serenity::CreateEmbed,
) -> Result<ReplyHandle<'_>, serenity::Error> {
    let message = poise::CreateReply::default().embed(embed).reply(true);
    ctx.send(message).await
}

async fn send_temporary_embedded_reply(
    ctx: Context<'_>,
    embed: serenity::CreateEmbed,
) -> Result<(), serenity::Error> {
    let http = ctx.serenity_context().http.clone();
    let message = send_embedded_reply(ctx, embed)
        .await?
        .into_message()
        .await?;

    tokio::spawn(async move {
        tokio::time::sleep(DELETE_MSG_AFTER_SECS).await;

        let _ = message.delete(http).await;
    });

    Ok(())
}

/// Cooldown gate, then selection. The stamp happens as soon as the gate
/// passes, whatever the fetch ends up doing.
async fn send_category(ctx: Context<'_>, category: Category) -> Result<(), InternalError> {
    let data = ctx.data();
    let conversation = conversation(ctx);

    if let Err(left) = data.store().begin_send(conversation) {
        send_temporary_embedded_reply(ctx, cooldown_embed(left)).await?;

        return Ok(());
    }

    ctx.defer().await?;

    let text = data.selector.select_unique(conversation, category).await;
    let reply = poise::CreateReply::default()
        .embed(category_embed(category, &text))
        .components(vec![another_buttons()])
        .reply(true);
    ctx.send(reply).await?;

    Ok(())
}

async fn send_settings_outcome<T>(
    ctx: Context<'_>,
    outcome: Result<T, SettingsError>,
    success: impl FnOnce(T) -> String,
) -> Result<(), InternalError> {
    let embed = match outcome {
        Ok(value) => serenity::CreateEmbed::new().title(success(value)),
        Err(err) => {
            log::info!("settings change refused in {}: {err}", conversation(ctx));
            serenity::CreateEmbed::new().title(refusal_title(&err))
        }
    };
    send_embedded_reply(ctx, embed).await?;

    Ok(())
}

async fn handle_error(err: poise::FrameworkError<'_, BotData, InternalError>) {
    match err {
        poise::FrameworkError::Command { ctx, ref error, .. } => {
            log::error!(
                "unexpected error while executing '{}' command: {error}",
                ctx.command().name
            );

            let embed = serenity::CreateEmbed::new()
                .title(":man_shrugging: Something went wrong and Idk why...");
            let _ = send_embedded_reply(ctx, embed).await;
        }
        poise::FrameworkError::CommandPanic { ctx, payload, .. } => {
            log::error!(
                "'{}' command was abruptly stopped (i.e., panicked): {}",
                ctx.command().name,
                payload.as_deref().unwrap_or("unknown reason")
            );
        }
        poise::FrameworkError::MissingBotPermissions { .. } => (),
        err => log::error!("scary error: {err}"),
    }
}

/// Shows the commands and this channel's settings
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn start(ctx: Context<'_>) -> Result<(), InternalError> {
    let state = ctx.data().store().get(conversation(ctx));

    let embed = serenity::CreateEmbed::new()
        .title("Compliment or roast?")
        .description(
            "I flip a coin on `/random` and send a compliment or a roast.
            Buttons below for quick picks.",
        )
        .field(
            ":scroll: | Commands:",
            "`/force_compliment` always compliment\n\
             `/force_roast` always roast\n\
             `/mode pg|spicy` set the vibe (admin-locked)\n\
             `/cooldown <secs>` rate limit (admin-locked)\n\
             `/admin_lock on|off` restrict settings to admins\n\
             `/about` what is this\n\
             `/source` links & credits",
            false,
        )
        .field(
            ":gear: | Current:",
            format!(
                "mode={}, cooldown={}s, admin_lock={}",
                state.mode,
                state.cooldown_secs(),
                if state.admin_locked { "on" } else { "off" }
            ),
            false,
        );

    let reply = poise::CreateReply::default()
        .embed(embed)
        .components(vec![another_buttons()])
        .reply(true);
    ctx.send(reply).await?;

    Ok(())
}

/// Flips a coin between a compliment and a roast
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn random(ctx: Context<'_>) -> Result<(), InternalError> {
    send_category(ctx, Category::random()).await
}

/// Always sends a compliment
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn force_compliment(ctx: Context<'_>) -> Result<(), InternalError> {
    send_category(ctx, Category::Compliment).await
}

/// Always sends a roast
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn force_roast(ctx: Context<'_>) -> Result<(), InternalError> {
    send_category(ctx, Category::Roast).await
}

/// Sets the vibe of fallback lines
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn mode(
    ctx: Context<'_>,
    #[description = "pg or spicy"] vibe: String,
) -> Result<(), InternalError> {
    let admin = is_admin(ctx).await;
    let outcome = settings::set_mode(ctx.data().store(), conversation(ctx), &vibe, admin);

    send_settings_outcome(ctx, outcome, |mode| {
        format!(":performing_arts: Mode set to **{mode}**")
    })
    .await
}

/// Shows or sets the minimum delay between two sends in this channel
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn cooldown(
    ctx: Context<'_>,
    #[description = "seconds, 0 to 3600"] seconds: Option<String>,
) -> Result<(), InternalError> {
    let admin = is_admin(ctx).await;
    let store = ctx.data().store();

    let Some(seconds) = seconds else {
        let outcome = settings::current_cooldown(store, conversation(ctx), admin);

        return send_settings_outcome(ctx, outcome, |current| {
            format!(":stopwatch: Current cooldown: **{current}s**")
        })
        .await;
    };

    let outcome = settings::set_cooldown(store, conversation(ctx), &seconds, admin);

    send_settings_outcome(ctx, outcome, |secs| {
        format!(":stopwatch: Cooldown set to **{secs}s**")
    })
    .await
}

/// Restricts mode and cooldown changes to admins
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn admin_lock(
    ctx: Context<'_>,
    #[description = "on or off"] state: String,
) -> Result<(), InternalError> {
    let admin = is_admin(ctx).await;
    let outcome = settings::set_admin_lock(ctx.data().store(), conversation(ctx), &state, admin);

    send_settings_outcome(ctx, outcome, |locked| {
        format!(
            ":lock: admin_lock is now **{}**",
            if locked { "on" } else { "off" }
        )
    })
    .await
}

/// What is this bot
#[poise::command(slash_command, required_permissions = "SEND_MESSAGES")]
async fn about(ctx: Context<'_>) -> Result<(), InternalError> {
    let embed = serenity::CreateEmbed::new().title("About").description(
        "I fetch compliments and roasts from public APIs and try not to repeat myself.
        Buttons make it quick; admins can tune mode/cooldown.",
    );
    send_embedded_reply(ctx, embed).await?;

    Ok(())
}

/// Links and credits
#[poise::command(slash_command, rename = "source", required_permissions = "SEND_MESSAGES")]
async fn credits(ctx: Context<'_>) -> Result<(), InternalError> {
    let embed = serenity::CreateEmbed::new()
        .title("APIs & libs")
        .field(":sparkles: | Compliments:", "complimentr.com/api", false)
        .field(":fire: | Roasts:", "insult.mattbas.org/api", false)
        .field(":books: | Library:", "poise, serenity, reqwest", false);
    send_embedded_reply(ctx, embed).await?;

    Ok(())
}

/// Button presses go through the same cooldown gate as the commands.
async fn handle_more_button(
    ctx: &serenity::Context,
    data: &BotData,
    component: &serenity::ComponentInteraction,
) -> Result<(), serenity::Error> {
    let category = match component.data.custom_id.as_str() {
        MORE_COMPLIMENT => Category::Compliment,
        MORE_ROAST => Category::Roast,
        _ => return Ok(()),
    };

    let conversation = component.channel_id.get();

    if let Err(left) = data.store().begin_send(conversation) {
        let message = serenity::CreateInteractionResponseMessage::new()
            .embed(cooldown_embed(left))
            .ephemeral(true);

        return component
            .create_response(ctx, serenity::CreateInteractionResponse::Message(message))
            .await;
    }

    let thinking = serenity::CreateInteractionResponseMessage::new();
    component
        .create_response(ctx, serenity::CreateInteractionResponse::Defer(thinking))
        .await?;

    let text = data.selector.select_unique(conversation, category).await;
    let reply = serenity::EditInteractionResponse::new()
        .embed(category_embed(category, &text))
        .components(vec![another_buttons()]);
    component.edit_response(ctx, reply).await?;

    Ok(())
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, InternalError>,
    data: &BotData,
) -> Result<(), InternalError> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            let servers = data_about_bot.guilds.len();
            let session = data_about_bot.session_id.as_str();
            log::info!(
                "bot has been connected to discord on {} server{} (session '{}')",
                servers,
                if servers != 1 { "s" } else { "" },
                session
            );
        }
        serenity::FullEvent::Resume { .. } => {
            log::info!("bot was reconnected to discord");
        }
        serenity::FullEvent::ShardsReady { total_shards } => {
            log::info!("bot shards are ready (loaded {})", total_shards);
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            handle_more_button(ctx, data, component).await?;
        }
        _ => (),
    }

    Ok(())
}

fn build_selector(conf: &config::App) -> Result<Selector, reqwest::Error> {
    let client = source::http_client(conf.upstream.timeout())?;
    log::info!(
        "http client ready (timeout {}s)",
        conf.upstream.timeout_secs
    );

    let compliments = FallbackSource::new(
        Category::Compliment,
        HttpUpstream::new(
            client.clone(),
            conf.upstream.compliment_url.clone(),
            Category::Compliment,
        ),
    );
    let roasts = FallbackSource::new(
        Category::Roast,
        HttpUpstream::new(client, conf.upstream.roast_url.clone(), Category::Roast),
    );

    let store = StateStore::new(conf.chat.defaults());
    let selector = Selector::new(store, Box::new(compliments), Box::new(roasts))
        .with_max_attempts(conf.chat.max_attempts);

    Ok(selector)
}

fn build_framework(selector: Selector) -> poise::Framework<BotData, InternalError> {
    let data = BotData::new(selector);

    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                start(),
                random(),
                force_compliment(),
                force_roast(),
                mode(),
                cooldown(),
                admin_lock(),
                about(),
                credits(),
            ],
            on_error: |err| Box::pin(handle_error(err)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                let create_commands = poise::builtins::create_application_commands(commands);
                serenity::Command::set_global_commands(ctx, create_commands).await?;

                Ok(data)
            })
        })
        .build()
}

async fn build_client(
    bot: config::Bot,
    framework: poise::Framework<BotData, InternalError>,
) -> Result<serenity::Client, serenity::Error> {
    let intents = serenity::GatewayIntents::GUILDS;
    let activity = serenity::ActivityData {
        name: "Handing out compliments and roasts".to_string(),
        kind: serenity::ActivityType::Playing,
        state: None,
        url: None,
    };
    let status = serenity::OnlineStatus::Online;

    serenity::ClientBuilder::new(bot.discord_token, intents)
        .framework(framework)
        .activity(activity)
        .status(status)
        .await
}

pub async fn run(config: config::App) -> Result<(), Error> {
    let selector = build_selector(&config).map_err(Error::HttpClient)?;
    let framework = build_framework(selector);

    let mut client = build_client(config.bot, framework)
        .await
        .map_err(Error::Creation)?;

    client.start().await.map_err(Error::Initialization)
}
