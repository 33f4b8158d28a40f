use std::{path::Path, time::Duration};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment};

use crate::state::{Defaults, Mode, MAX_COOLDOWN_SECS};

const TOKEN_PLACEHOLDER: &str = "PASTE_YOUR_BOT_TOKEN_HERE";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read config")]
    ReadedError(#[source] ConfigError),
    #[error("failed to parse config")]
    ParserError(#[source] ConfigError),
    #[error("discord_token is missing or still the placeholder")]
    MissingToken,
    #[error("timeout_secs must be greater than zero")]
    InvalidTimeout,
    #[error("default_cooldown_secs must be between 0 and 3600")]
    InvalidCooldown,
    #[error("max_attempts must be greater than zero")]
    InvalidMaxAttempts,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Bot {
    pub discord_token: String,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Upstream {
    #[serde(default = "default_compliment_url")]
    pub compliment_url: String,
    #[serde(default = "default_roast_url")]
    pub roast_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            compliment_url: default_compliment_url(),
            roast_url: default_roast_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Upstream {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Chat {
    #[serde(default = "default_cooldown_secs")]
    pub default_cooldown_secs: u32,
    #[serde(default = "default_admin_lock")]
    pub default_admin_lock: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            default_cooldown_secs: default_cooldown_secs(),
            default_admin_lock: default_admin_lock(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Chat {
    pub fn defaults(&self) -> Defaults {
        Defaults {
            mode: Mode::Standard,
            cooldown_secs: self.default_cooldown_secs,
            admin_locked: self.default_admin_lock,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct App {
    pub bot: Bot,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub chat: Chat,
}

fn default_compliment_url() -> String {
    "https://complimentr.com/api".to_string()
}

fn default_roast_url() -> String {
    "https://insult.mattbas.org/api/insult.json?template=You%20are%20a%20$n.".to_string()
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_cooldown_secs() -> u32 {
    2
}

fn default_admin_lock() -> bool {
    true
}

fn default_max_attempts() -> usize {
    crate::selector::DEFAULT_MAX_ATTEMPTS
}

impl App {
    /// Reads `path` and overlays `COMPLIROAST__SECTION__KEY` variables.
    pub fn parse(path: &Path) -> Result<Self, Error> {
        let file = config::File::from(path);

        Self::load(Config::builder().add_source(file))
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, Error> {
        let config = builder
            .add_source(Environment::with_prefix("COMPLIROAST").separator("__"))
            .build()
            .map_err(Error::ReadedError)?
            .try_deserialize::<App>()
            .map_err(Error::ParserError)?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let token = self.bot.discord_token.trim();
        if token.is_empty() || token.contains(TOKEN_PLACEHOLDER) {
            return Err(Error::MissingToken);
        }

        if self.upstream.timeout_secs == 0 {
            return Err(Error::InvalidTimeout);
        }

        if self.chat.default_cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(Error::InvalidCooldown);
        }

        if self.chat.max_attempts == 0 {
            return Err(Error::InvalidMaxAttempts);
        }

        Ok(())
    }
}
