use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Tag attached to an upstream failure the moment it is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    RateLimit,
    Timeout,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientKind::RateLimit => f.write_str("rate limit"),
            TransientKind::Timeout => f.write_str("timeout"),
        }
    }
}

/// How the retry primitive should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RateLimit,
    Timeout,
    Other,
}

impl RetryClass {
    pub fn is_transient(self) -> bool {
        !matches!(self, RetryClass::Other)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("News provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model did not return valid JSON: {0}")]
    Parse(String),

    #[error("Summary failed validation: {0}")]
    Schema(String),

    #[error("Transient {kind} error: {message}")]
    Transient {
        kind: TransientKind,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Generation API error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        AppError::Transient {
            kind: TransientKind::RateLimit,
            message: message.into(),
            retry_after,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        AppError::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            AppError::Transient {
                kind: TransientKind::RateLimit,
                ..
            } => RetryClass::RateLimit,
            AppError::Transient {
                kind: TransientKind::Timeout,
                ..
            } => RetryClass::Timeout,
            _ => RetryClass::Other,
        }
    }

    /// Server-provided lower bound on the wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Sqlite(_))
    }
}
