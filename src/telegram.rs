//! Telegram Bot API integration
//!
//! Inbound update envelope types plus the outbound client for
//! `sendMessage` and `setWebhook`. Uses a long-lived reqwest::Client for
//! connection pooling. The base URL embeds the bot token, so it is never
//! logged.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::EngineError;
use crate::Result;

//
// ================= Inbound envelope =================
//

/// Webhook update. Only the fields the engine reads are decoded; Telegram
/// sends many more.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Canonical chat identifier, a 64-bit integer.
    pub id: i64,
}

//
// ================= Outbound client =================
//

pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", bot_token),
        })
    }

    /// Sends a Markdown-formatted reply to a chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        #[derive(Serialize)]
        struct SendMessage<'a> {
            chat_id: i64,
            text: &'a str,
            parse_mode: &'a str,
        }

        self.call(
            "sendMessage",
            &SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
            },
        )
        .await
    }

    /// Registers the webhook URL with Telegram (boot-time self-registration).
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        #[derive(Serialize)]
        struct SetWebhook<'a> {
            url: &'a str,
        }

        self.call("setWebhook", &SetWebhook { url }).await
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<()> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        let api_reply: ApiReply = response.json().await.map_err(|_| {
            EngineError::Telegram(format!("{} returned unreadable reply ({})", method, status))
        })?;

        if !api_reply.ok {
            return Err(EngineError::Telegram(format!(
                "{} failed: {}",
                method,
                api_reply
                    .description
                    .unwrap_or_else(|| status.to_string())
            )));
        }

        info!("Telegram {} ok", method);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
