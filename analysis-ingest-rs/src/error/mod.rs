//! Error handling for analysis ingestion
//!
//! The taxonomy mirrors the failure surface of the pipeline:
//! - `TransportError` for anything that goes wrong reaching a model provider
//! - `ParseFailure` when every repair stage is exhausted
//! - `MonitoringUnavailable` for best-effort enrichment that could not be fetched
//! - `StoreError` for the persisted cache mirror
//! - `ConfigError` for settings that cannot be assembled
//!
//! Only `ConfigError` ever reaches a caller of the public surface; the others
//! are recovered inside the orchestrator or the cache.

pub mod mapping;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::repair::RepairAttempt;

/// Failure reaching a model provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The dispatch did not complete within its time budget
    #[error("Provider request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Connection failures and other network-level problems
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered but the payload was unusable
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The adapter is missing settings it needs (e.g. an API key)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Short machine-friendly label used in logs and fallback text.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Network(_) => "network",
            TransportError::Status { .. } => "status",
            TransportError::InvalidResponse(_) => "invalid_response",
            TransportError::NotConfigured(_) => "not_configured",
        }
    }
}

/// Convert reqwest errors to TransportError
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            TransportError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            TransportError::InvalidResponse(format!("Response decode error: {}", err))
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Maximum number of characters of raw text kept in a [`ParseFailure`].
pub const EXCERPT_CHARS: usize = 200;

/// Every repair stage failed to produce parseable text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not parse model response: {message}")]
pub struct ParseFailure {
    /// The error reported by the direct parse of the raw text
    pub message: String,
    /// Leading excerpt of the raw text
    pub excerpt: String,
    /// The stages that were tried, in order
    pub attempts: Vec<RepairAttempt>,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>, raw: &str, attempts: Vec<RepairAttempt>) -> Self {
        Self {
            message: message.into(),
            excerpt: excerpt(raw),
            attempts,
        }
    }
}

/// Leading [`EXCERPT_CHARS`] characters of `raw`, with an ellipsis when cut.
pub fn excerpt(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// External monitoring context could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Monitoring unavailable: {0}")]
pub struct MonitoringUnavailable(pub String);

impl From<reqwest::Error> for MonitoringUnavailable {
    fn from(err: reqwest::Error) -> Self {
        MonitoringUnavailable(err.to_string())
    }
}

/// Errors from the persistent key-value store backing the cache.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Settings could not be assembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Why an analysis degraded to a fallback record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(TransportError),
    Parse(ParseFailure),
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Transport(_) => "provider transport failure",
            FailureReason::Parse(_) => "unparseable model response",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(err) => write!(f, "{}", err),
            FailureReason::Parse(err) => write!(f, "{}", err),
        }
    }
}

impl From<TransportError> for FailureReason {
    fn from(err: TransportError) -> Self {
        FailureReason::Transport(err)
    }
}

impl From<ParseFailure> for FailureReason {
    fn from(err: ParseFailure) -> Self {
        FailureReason::Parse(err)
    }
}
