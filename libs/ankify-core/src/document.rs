//! A markdown notes file on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::frontmatter::{split_front_matter, FrontMatter};
use crate::parser::{parse, ParseOutcome};
use crate::reconcile::reconcile;
use crate::types::{DeckPath, InvalidCardPolicy};

/// Notes file split into front matter and body.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    front_matter: Option<FrontMatter>,
    body: String,
}

impl Document {
    /// Read and split the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_text(path, &text)
    }

    pub fn from_text(path: &Path, text: &str) -> Result<Self> {
        let (front_matter, body) = split_front_matter(text)?;
        Ok(Self {
            path: path.to_path_buf(),
            front_matter,
            body: body.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Full file contents, front matter included.
    pub fn text(&self) -> String {
        match &self.front_matter {
            Some(front_matter) => format!("{}{}", front_matter.raw, self.body),
            None => self.body.clone(),
        }
    }

    /// Root deck: front matter `deck`/`title`, else `default`.
    pub fn root_deck(&self, default: &str) -> Result<DeckPath> {
        let name = self
            .front_matter
            .as_ref()
            .and_then(FrontMatter::deck_name)
            .unwrap_or(default);
        DeckPath::root(name)
    }

    /// Back-reference stored with every note created from this file.
    pub fn source_ref(&self) -> String {
        format!("obsidian://open?path={}", self.path.display())
    }

    /// Parse and validate the body.
    pub fn parse(&self, default_deck: &str, policy: InvalidCardPolicy) -> Result<ParseOutcome> {
        let root = self.root_deck(default_deck)?;
        let outcome = parse(&self.body, &root)?;
        outcome.validate(&self.body, policy)?;
        Ok(outcome)
    }

    /// Assign ids to cards without one. Returns whether the body changed.
    pub fn reconcile(&mut self, outcome: &mut ParseOutcome) -> Result<bool> {
        let reconciled = reconcile(&self.body, outcome)?;
        let changed = reconciled.changed();
        self.body = reconciled.body;
        Ok(changed)
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.text())?;
        Ok(())
    }
}
