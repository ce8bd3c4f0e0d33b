//! Error types for ankify-core.

use thiserror::Error;

use crate::types::InvalidReason;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while reading, parsing or rewriting a notes file.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("mismatch between level 3 headings ({headings}) and extracted cards ({cards})")]
    StructuralMismatch { headings: usize, cards: usize },

    #[error("invalid card '{title}' at line {line}: {reason}")]
    InvalidCard {
        title: String,
        line: usize,
        reason: InvalidReason,
    },

    #[error("card at line {line} has no id, reconcile the file first")]
    MissingId { line: usize },

    #[error("duplicate card id {0}")]
    DuplicateCardId(String),

    #[error("invalid deck name: {0:?}")]
    InvalidDeckName(String),

    #[error("front matter error: {0}")]
    FrontMatter(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
