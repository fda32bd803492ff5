// src/infra/errors.rs - Error types for Caigentan

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaigentanError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("No API key configured. Set {env} or add `api_key` to config.toml.")]
    NoApiKey { env: String },

    // Chat backend errors, converted to an advisory at the session boundary
    #[error("Chat history unavailable: {0}")]
    HistoryUnavailable(String),

    /// Carries the most specific message available (backend `error` field,
    /// transport error, or a generic fallback).
    #[error("{0}")]
    SendFailed(String),

    #[error("Clear history failed: {0}")]
    ClearFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    // Preference staging errors (propagated to the caller)
    #[error("Failed to stage preferences: {0}")]
    PreferenceSaveFailed(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaigentanError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CaigentanError::Provider {
                retriable: true,
                ..
            } | CaigentanError::RateLimited { .. }
        )
    }
}
