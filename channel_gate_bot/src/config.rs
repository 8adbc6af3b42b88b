use std::{fs, time::Duration};

use teloxide::types::UserId;

const DEFAULT_DATABASE_URL: &str = "sqlite:channel_gate.sqlite";
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no BOT_TOKEN variable and could not read key file \"{path}\": {source}")]
    NoToken {
        path: &'static str,
        source: std::io::Error,
    },
    #[error("ADMIN_ID is not set")]
    NoAdmin,
    #[error("ADMIN_ID is not a Telegram user ID: \"{0}\"")]
    BadAdmin(String),
    #[error("LOOKUP_TIMEOUT_SECS is not a positive number of seconds: \"{0}\"")]
    BadTimeout(String),
}

/// Everything the bot needs to know on startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// The one user allowed to manage channels.
    pub admin_id: UserId,
    pub database_url: String,
    /// How long to wait for Telegram to tell if someone is in a channel.
    pub lookup_timeout: Duration,
}

impl Config {
    /// Read the config from the environment, loading `.env` first if there is one.
    ///
    /// The token is taken from `BOT_TOKEN`, or the `key` file
    /// (`key_debug` in debug builds) if that's unset.
    pub fn from_env() -> Result<Config, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env file: {e}");
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let token = match var("BOT_TOKEN") {
            Some(token) => token,
            None => {
                let path = match cfg!(debug_assertions) {
                    true => "key_debug",
                    false => "key",
                };
                fs::read_to_string(path).map_err(|source| ConfigError::NoToken { path, source })?
            }
        };

        let admin_id = var("ADMIN_ID").ok_or(ConfigError::NoAdmin)?;
        let admin_id = admin_id
            .trim()
            .parse()
            .map(UserId)
            .map_err(|_| ConfigError::BadAdmin(admin_id))?;

        let database_url = var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let lookup_timeout = match var("LOOKUP_TIMEOUT_SECS") {
            Some(secs) => match secs.trim().parse::<u64>() {
                Ok(x) if x > 0 => Duration::from_secs(x),
                _ => return Err(ConfigError::BadTimeout(secs)),
            },
            None => DEFAULT_LOOKUP_TIMEOUT,
        };

        Ok(Config {
            token: token.trim().to_string(),
            admin_id,
            database_url,
            lookup_timeout,
        })
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_id == user
    }
}
