//! Personal-Finance Ledger Assistant
//!
//! A Telegram-facing finance assistant that:
//! - Receives messages through a secret-bearing webhook
//! - Extracts a typed intent from free text via the Gemini API
//! - Applies the intent to durable ledger tables (transactions, bills,
//!   accounts, category goals)
//! - Replies with a formatted pt-BR confirmation
//!
//! PIPELINE:
//! UPDATE → IDENTITY → CLASSIFY → DISPATCH → LEDGER → REPLY

pub mod api;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gemini;
pub mod matching;
pub mod models;
pub mod periods;
pub mod reply;
pub mod store;
pub mod telegram;

pub use error::{EngineError, Result};

// Re-export common types
pub use models::*;
pub use classifier::IntentClassifier;
