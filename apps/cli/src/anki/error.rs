//! AnkiConnect error types.

use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum AnkiError {
    /// Anki unreachable, slow, or dropped the connection.
    #[error("Failed to connect to Anki: {0}")]
    Connectivity(String),

    /// Anki answered, but not with a well-formed successful response.
    #[error("AnkiConnect protocol violation: {0}")]
    ProtocolViolation(String),
}

impl Retryable for AnkiError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<reqwest::Error> for AnkiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connectivity(
                "Is Anki running with AnkiConnect plugin installed?".to_string(),
            )
        } else if e.is_timeout() {
            Self::Connectivity("Request timed out".to_string())
        } else if let Some(status) = e.status() {
            Self::Connectivity(format!("HTTP {}", status.as_u16()))
        } else {
            Self::Connectivity(e.to_string())
        }
    }
}
