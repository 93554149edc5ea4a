//! Process configuration
//!
//! Every setting comes from the environment; nothing is hard-coded.
//! The binary loads `.env` (via dotenv) before calling [`Config::from_env`].

use chrono::FixedOffset;

use crate::error::{EngineError, Result};

/// Default listen port when `PORT` is unset.
const DEFAULT_PORT: u16 = 8080;

/// Default local UTC offset (hours) for report windows. The reference
/// deployment serves users in UTC-3; report windows follow the user's
/// wall clock, not the server's.
const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token; also the secret segment of the webhook path.
    pub bot_token: String,
    /// Postgres connection string for the ledger store.
    pub database_url: String,
    /// Gemini API key. May be empty: every classification then degrades
    /// to the chat fallback instead of failing the request.
    pub gemini_api_key: String,
    /// Public HTTPS base URL. When present the bot registers
    /// `{base}/webhook/{token}` with Telegram at boot.
    pub public_base_url: Option<String>,
    pub port: u16,
    /// Local UTC offset in whole hours, applied to report windows.
    pub utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = require("TELEGRAM_BOT_TOKEN")?;

        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("POSTGRES_URL"))
            .map_err(|_| EngineError::Config("DATABASE_URL not set".to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| EngineError::Config(format!("invalid PORT value: {}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        let utc_offset_hours = match std::env::var("UTC_OFFSET_HOURS") {
            Ok(raw) => raw.parse().map_err(|_| {
                EngineError::Config(format!("invalid UTC_OFFSET_HOURS value: {}", raw))
            })?,
            Err(_) => DEFAULT_UTC_OFFSET_HOURS,
        };
        if !(-23..=23).contains(&utc_offset_hours) {
            return Err(EngineError::Config(format!(
                "UTC_OFFSET_HOURS out of range: {}",
                utc_offset_hours
            )));
        }

        Ok(Self {
            bot_token,
            database_url,
            gemini_api_key,
            public_base_url,
            port,
            utc_offset_hours,
        })
    }

    /// Fixed offset used for report windows and default month tokens.
    pub fn local_offset(&self) -> FixedOffset {
        // Range-checked in from_env, so this cannot overflow.
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    /// Webhook URL to register with Telegram, if a public base is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{}/webhook/{}", base, self.bot_token))
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| EngineError::Config(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_offset_sign() {
        let config = Config {
            bot_token: "t".to_string(),
            database_url: "postgres://localhost/ledger".to_string(),
            gemini_api_key: String::new(),
            public_base_url: None,
            port: 8080,
            utc_offset_hours: -3,
        };
        assert_eq!(config.local_offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_webhook_url_includes_token() {
        let config = Config {
            bot_token: "123:abc".to_string(),
            database_url: "postgres://localhost/ledger".to_string(),
            gemini_api_key: String::new(),
            public_base_url: Some("https://bot.example.com".to_string()),
            port: 8080,
            utc_offset_hours: 0,
        };
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example.com/webhook/123:abc")
        );
    }
}
