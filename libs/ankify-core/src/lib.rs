//! Core library for turning markdown notes into Anki cards.
//!
//! Provides:
//! - Markdown card parser (heading-delimited blocks with fenced bodies)
//! - Stable id reconciliation that rewrites the notes file in place
//! - Front matter handling for per-file deck names
//! - Markdown to HTML rendering that keeps MathJax spans intact
//! - Shared types (Card, DeckPath, ParsedCard, ...)

pub mod document;
pub mod error;
pub mod frontmatter;
pub mod parser;
pub mod reconcile;
pub mod render;
pub mod types;

pub use document::Document;
pub use error::{CoreError, Result};
pub use parser::{parse, ParseOutcome};
pub use reconcile::{reconcile, reconcile_file, Reconciled};
pub use render::markdown_to_html;
pub use types::{
    new_card_id, Card, DeckPath, DroppedCard, InvalidCardPolicy, InvalidReason, ParsedCard,
};
