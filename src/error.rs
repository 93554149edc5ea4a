//! Error types for the ledger assistant

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classification error: {0}")]
    Classification(String),

    /// Required intent field missing or unusable. The message names the
    /// field in user-facing terms; the dispatcher renders it as a
    /// clarifying reply instead of an apology.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Database driver error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
