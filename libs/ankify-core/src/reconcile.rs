//! Stable id assignment for cards that do not carry one yet.
//!
//! Reconciliation rewrites the markdown so that every emitted card has a
//! `^<id>` marker line right under its `###` heading. Running it again on its
//! own output changes nothing.

use std::collections::HashMap;
use std::path::Path;

use crate::document::Document;
use crate::error::{CoreError, Result};
use crate::parser::{id_marker, ParseOutcome, CARD_HEADING, ID_MARKER, QUESTION_HEADING};
use crate::types::{new_card_id, ParsedCard};

/// Result of reconciling one markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub body: String,
    /// Ids inserted during this pass, in file order.
    pub assigned: Vec<String>,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        !self.assigned.is_empty()
    }
}

/// Insert id markers for cards of `outcome` that lack one.
///
/// `outcome` must come from parsing `body`; the ids written to the text are
/// also filled into the matching cards.
pub fn reconcile(body: &str, outcome: &mut ParseOutcome) -> Result<Reconciled> {
    reconcile_with(body, outcome, new_card_id)
}

/// Reconcile the file at `path` in place, writing only when ids were added.
///
/// Returns whether the file changed.
pub fn reconcile_file(path: &Path, outcome: &mut ParseOutcome) -> Result<bool> {
    let mut document = Document::load(path)?;
    let changed = document.reconcile(outcome)?;
    if changed {
        document.save()?;
    }
    Ok(changed)
}

pub(crate) fn reconcile_with<F>(
    body: &str,
    outcome: &mut ParseOutcome,
    mut next_id: F,
) -> Result<Reconciled>
where
    F: FnMut() -> String,
{
    let lines: Vec<&str> = body.split('\n').collect();
    let headings: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with(CARD_HEADING))
        .map(|(idx, _)| idx)
        .collect();

    if headings.len() != outcome.block_count() {
        return Err(CoreError::StructuralMismatch {
            headings: headings.len(),
            cards: outcome.block_count(),
        });
    }

    // Cards are keyed by their 1-indexed heading line.
    let mut cards: HashMap<usize, &mut ParsedCard> = outcome
        .cards
        .iter_mut()
        .map(|card| (card.line, card))
        .collect();

    let mut output: Vec<String> = Vec::with_capacity(lines.len() + headings.len());
    let mut assigned = Vec::new();
    let mut next_heading = headings.iter().copied().peekable();

    for (idx, line) in lines.iter().enumerate() {
        output.push((*line).to_string());

        if next_heading.peek() != Some(&idx) {
            continue;
        }
        next_heading.next();
        let span_end = next_heading.peek().copied().unwrap_or(lines.len());

        if !needs_marker(&lines[idx + 1..span_end]) {
            continue;
        }
        let Some(card) = cards.get_mut(&(idx + 1)) else {
            continue;
        };
        if card.id.is_some() {
            continue;
        }

        let id = next_id();
        let line_ending = if line.ends_with('\r') { "\r" } else { "" };
        output.push(format!("{}{}{}", ID_MARKER, id, line_ending));
        card.id = Some(id.clone());
        assigned.push(id);
    }

    Ok(Reconciled {
        body: output.join("\n"),
        assigned,
    })
}

/// True when the card span reaches its question heading without an id marker.
fn needs_marker(span: &[&str]) -> bool {
    for line in span {
        if id_marker(line.trim_end_matches('\r')).is_some() {
            return false;
        }
        if line.starts_with(QUESTION_HEADING) {
            return true;
        }
    }
    false
}
