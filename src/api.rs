//! HTTP surface
//!
//! Two routes: a liveness probe on `/` and the secret-bearing webhook.
//! The webhook path segment must match the configured secret and the body
//! must be declared `application/json`; anything else is rejected with 403
//! before touching the engine.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::dispatcher::IntentDispatcher;
use crate::telegram::{TelegramClient, Update};
use crate::Result;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<IntentDispatcher>,
    pub telegram: Arc<TelegramClient>,
    /// Secret path segment Telegram must echo back (the bot token).
    pub webhook_secret: Arc<String>,
}

async fn liveness() -> &'static str {
    "Assistente financeiro online"
}

async fn webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if secret != *state.webhook_secret {
        warn!("Webhook call with wrong secret");
        return StatusCode::FORBIDDEN;
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        warn!("Webhook call with non-JSON content type");
        return StatusCode::FORBIDDEN;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            // Acknowledge so Telegram doesn't redeliver a body we can
            // never parse.
            warn!("Discarding unparseable update: {}", e);
            return StatusCode::OK;
        }
    };

    let Some(message) = update.message else {
        return StatusCode::OK;
    };
    let Some(text) = message.text else {
        return StatusCode::OK;
    };

    info!("Update {} from chat {}", update.update_id, message.chat.id);

    let reply_text = state.dispatcher.handle(message.chat.id, &text).await;

    if let Err(e) = state.telegram.send_message(message.chat.id, &reply_text).await {
        error!("Failed to deliver reply to chat {}: {}", message.chat.id, e);
    }

    StatusCode::OK
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/webhook/:secret", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Webhook server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
