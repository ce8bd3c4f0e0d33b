//! Core types for cards and decks.

use std::fmt;

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Separator used by Anki for nested decks.
pub const DECK_SEPARATOR: &str = "::";

/// Hierarchical deck name, e.g. `Ankify::Rust::Ownership`.
///
/// Always holds at least one segment and never an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeckPath {
    segments: Vec<String>,
}

impl DeckPath {
    /// Create a path from a root deck name. `A::B` yields two segments.
    pub fn root(name: &str) -> Result<Self> {
        Ok(Self {
            segments: split_segments(name)?,
        })
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.extend(split_segments(segment)?);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Deck name as Anki expects it.
    pub fn materialize(&self) -> String {
        self.segments.join(DECK_SEPARATOR)
    }
}

impl fmt::Display for DeckPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.materialize())
    }
}

impl Serialize for DeckPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.materialize())
    }
}

/// Split on the deck separator; every piece must be non-blank.
fn split_segments(name: &str) -> Result<Vec<String>> {
    name.split(DECK_SEPARATOR)
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                Err(CoreError::InvalidDeckName(name.to_string()))
            } else {
                Ok(piece.to_string())
            }
        })
        .collect()
}

/// Generate a fresh stable card id (32 lowercase hex characters).
pub fn new_card_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Card as extracted from markdown; `id` is missing until reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCard {
    pub title: String,
    pub id: Option<String>,
    pub deck_path: DeckPath,
    pub question: String,
    pub answer: String,
    /// Line of the `###` heading (1-indexed, relative to the body).
    pub line: usize,
    /// Last line consumed by this card.
    pub end_line: usize,
}

impl ParsedCard {
    /// Turn into a syncable card. Fails if no id has been assigned yet.
    pub fn into_card(self, source_ref: Option<String>) -> Result<Card> {
        let id = self.id.ok_or(CoreError::MissingId { line: self.line })?;
        Ok(Card {
            id,
            deck_path: self.deck_path,
            question: self.question,
            answer: self.answer,
            source_ref,
            tags: Vec::new(),
        })
    }
}

/// Why a card block was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    EmptyQuestion,
    EmptyAnswer,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuestion => f.write_str("question is empty"),
            Self::EmptyAnswer => f.write_str("answer is empty"),
        }
    }
}

/// Card block that was opened by a heading but never became a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCard {
    pub title: String,
    pub line: usize,
    pub reason: InvalidReason,
}

/// What to do with card blocks that have an empty question or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidCardPolicy {
    /// Fail the whole file.
    #[default]
    Reject,
    /// Leave the block out and keep going.
    Skip,
}

/// Cards ready to be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: String,
    pub deck_path: DeckPath,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub tags: Vec<String>,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "=".repeat(80);
        let separator = "-".repeat(80);

        writeln!(f, "{}", border)?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Deck: {}", self.deck_path)?;
        if let Some(source) = &self.source_ref {
            writeln!(f, "Obsidian URL: {}", source)?;
        }
        writeln!(f, "{}", separator)?;
        writeln!(f, "QUESTION:\n{}", self.question)?;
        writeln!(f, "{}", separator)?;
        writeln!(f, "ANSWER:\n{}", self.answer)?;
        if !self.tags.is_empty() {
            writeln!(f, "{}", separator)?;
            writeln!(f, "Tags: {}", self.tags.join(", "))?;
        }
        write!(f, "{}", border)
    }
}
