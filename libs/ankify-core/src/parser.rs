//! Markdown parser for flashcard notes.
//!
//! # Format
//! ````markdown
//! # Rust
//! ## Ownership
//! ### Moves
//! ^3f1c0a9e8b7d4c2a9e8f7a6b5c4d3e2f
//! #### Question
//! ```
//! What happens to `a` after `let b = a;` for a `String`?
//! ```
//! #### Answer
//! ```
//! It is moved; using `a` afterwards is a compile error.
//! ```
//! ````
//!
//! Level 1 and 2 headings select the deck (`root::Rust::Ownership`), every
//! level 3 heading opens a card. The `^` line carries the card's stable id and
//! is written by [`crate::reconcile`] when missing.

use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::types::{DeckPath, DroppedCard, InvalidCardPolicy, InvalidReason, ParsedCard};

pub(crate) const CARD_HEADING: &str = "### ";
pub(crate) const QUESTION_HEADING: &str = "#### Question";
pub(crate) const ANSWER_HEADING: &str = "#### Answer";
pub(crate) const ID_MARKER: char = '^';

/// Cards found in one body of markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub cards: Vec<ParsedCard>,
    pub dropped: Vec<DroppedCard>,
}

impl ParseOutcome {
    /// Number of card blocks the parser opened, emitted or not.
    pub fn block_count(&self) -> usize {
        self.cards.len() + self.dropped.len()
    }

    /// Check the outcome against the text it came from.
    ///
    /// Every level 3 heading must have produced exactly one card block, ids
    /// found in the file must be unique, and dropped blocks are handled
    /// according to `policy`.
    pub fn validate(&self, body: &str, policy: InvalidCardPolicy) -> Result<()> {
        let headings = count_card_headings(body);
        if headings != self.block_count() {
            return Err(CoreError::StructuralMismatch {
                headings,
                cards: self.block_count(),
            });
        }

        if policy == InvalidCardPolicy::Reject {
            if let Some(dropped) = self.dropped.first() {
                return Err(CoreError::InvalidCard {
                    title: dropped.title.clone(),
                    line: dropped.line,
                    reason: dropped.reason,
                });
            }
        }

        let mut seen = HashSet::new();
        for id in self.cards.iter().filter_map(|c| c.id.as_deref()) {
            if !seen.insert(id) {
                return Err(CoreError::DuplicateCardId(id.to_string()));
            }
        }

        Ok(())
    }
}

/// Parse a markdown body (front matter already removed) into cards.
pub fn parse(content: &str, root: &DeckPath) -> Result<ParseOutcome> {
    let mut parser = Parser::new(root.clone());
    let mut last_line = 0;

    for (idx, line) in content.lines().enumerate() {
        last_line = idx + 1;
        parser.process_line(line, last_line)?;
    }

    Ok(parser.finalize(last_line))
}

/// Count card headings the same way the reconciler finds them.
pub fn count_card_headings(content: &str) -> usize {
    content
        .lines()
        .filter(|line| line.starts_with(CARD_HEADING))
        .count()
}

/// Stable id carried by a marker line, if this is one.
pub(crate) fn id_marker(line: &str) -> Option<&str> {
    let id = line.strip_prefix(ID_MARKER)?.trim();
    (!id.is_empty()).then_some(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InCard,
    QuestionHeaderSeen,
    InQuestionBlock { fence: usize },
    /// Question fence closed, waiting for the answer heading.
    QuestionClosed,
    AnswerHeaderSeen,
    InAnswerBlock { fence: usize },
}

enum Heading<'a> {
    Outer(&'a str),
    Inner(&'a str),
    Card(&'a str),
}

fn classify_heading(line: &str) -> Option<Heading<'_>> {
    if let Some(rest) = line.strip_prefix(CARD_HEADING) {
        return Some(Heading::Card(rest.trim()));
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return (!rest.starts_with('#')).then(|| Heading::Inner(rest.trim()));
    }
    if let Some(rest) = line.strip_prefix("# ") {
        return (!rest.starts_with('#')).then(|| Heading::Outer(rest.trim()));
    }
    None
}

/// Width of the backtick run opening a fenced block.
fn fence_width(line: &str) -> Option<usize> {
    let width = line.trim().chars().take_while(|&c| c == '`').count();
    (width > 0).then_some(width)
}

fn closes_fence(line: &str, fence: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() == fence && trimmed.chars().all(|c| c == '`')
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

struct CardBuilder {
    title: String,
    id: Option<String>,
    question: String,
    answer: String,
    deck_path: DeckPath,
    start_line: usize,
}

impl CardBuilder {
    fn new(title: &str, deck_path: DeckPath, start_line: usize) -> Self {
        Self {
            title: title.to_string(),
            id: None,
            question: String::new(),
            answer: String::new(),
            deck_path,
            start_line,
        }
    }

    fn build(self, end_line: usize) -> std::result::Result<ParsedCard, DroppedCard> {
        let question = self.question.trim();
        let answer = self.answer.trim();

        let reason = if question.is_empty() {
            Some(InvalidReason::EmptyQuestion)
        } else if answer.is_empty() {
            Some(InvalidReason::EmptyAnswer)
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(DroppedCard {
                title: self.title,
                line: self.start_line,
                reason,
            });
        }

        Ok(ParsedCard {
            title: self.title,
            id: self.id,
            deck_path: self.deck_path,
            question: question.to_string(),
            answer: answer.to_string(),
            line: self.start_line,
            end_line,
        })
    }
}

struct Parser {
    root: DeckPath,
    outer: Option<String>,
    inner: Option<String>,
    state: State,
    current: Option<CardBuilder>,
    outcome: ParseOutcome,
}

impl Parser {
    fn new(root: DeckPath) -> Self {
        Self {
            root,
            outer: None,
            inner: None,
            state: State::Outside,
            current: None,
            outcome: ParseOutcome::default(),
        }
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<()> {
        if let Some(heading) = classify_heading(line) {
            match heading {
                Heading::Outer(text) => {
                    self.outer = non_empty(text);
                    self.inner = None;
                }
                Heading::Inner(text) => self.inner = non_empty(text),
                Heading::Card(title) => self.open_card(title, line_num)?,
            }
            return Ok(());
        }

        self.state = self.transition(line, line_num);
        Ok(())
    }

    fn transition(&mut self, line: &str, line_num: usize) -> State {
        let state = self.state;
        match state {
            State::InCard if id_marker(line).is_some() => {
                if let Some(card) = self.current.as_mut() {
                    card.id = id_marker(line).map(str::to_string);
                }
                State::InCard
            }
            State::InCard | State::QuestionHeaderSeen if line.starts_with(QUESTION_HEADING) => {
                State::QuestionHeaderSeen
            }
            State::InQuestionBlock { .. } | State::QuestionClosed | State::AnswerHeaderSeen
                if line.starts_with(ANSWER_HEADING) =>
            {
                State::AnswerHeaderSeen
            }
            State::QuestionHeaderSeen => match fence_width(line) {
                Some(fence) => State::InQuestionBlock { fence },
                None => State::QuestionHeaderSeen,
            },
            State::InQuestionBlock { fence } => {
                if closes_fence(line, fence) {
                    State::QuestionClosed
                } else {
                    if let Some(card) = self.current.as_mut() {
                        card.question.push_str(line);
                        card.question.push('\n');
                    }
                    state
                }
            }
            State::AnswerHeaderSeen => match fence_width(line) {
                Some(fence) => State::InAnswerBlock { fence },
                None => State::AnswerHeaderSeen,
            },
            State::InAnswerBlock { fence } => {
                if closes_fence(line, fence) {
                    self.finish_card(line_num);
                    State::Outside
                } else {
                    if let Some(card) = self.current.as_mut() {
                        card.answer.push_str(line);
                        card.answer.push('\n');
                    }
                    state
                }
            }
            other => other,
        }
    }

    fn open_card(&mut self, title: &str, line_num: usize) -> Result<()> {
        if self.state != State::Outside {
            self.finish_card(line_num - 1);
        }

        let mut deck_path = self.root.clone();
        for segment in [&self.outer, &self.inner].into_iter().flatten() {
            deck_path = deck_path.child(segment)?;
        }

        self.current = Some(CardBuilder::new(title, deck_path, line_num));
        self.state = State::InCard;
        Ok(())
    }

    fn finish_card(&mut self, end_line: usize) {
        if let Some(builder) = self.current.take() {
            match builder.build(end_line) {
                Ok(card) => self.outcome.cards.push(card),
                Err(dropped) => self.outcome.dropped.push(dropped),
            }
        }
    }

    fn finalize(mut self, last_line: usize) -> ParseOutcome {
        if self.state != State::Outside {
            self.finish_card(last_line);
        }
        self.outcome
    }
}
