//! File and directory processing: parse, write ids, sync.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ankify_core::{Card, Document, ParsedCard};

use crate::config::Config;
use crate::sync::{SyncAction, SyncContext, SyncEngine};

/// What happened to one notes file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub cards: usize,
    pub created: usize,
    pub updated: usize,
    /// Whether new ids were written back to the file.
    pub ids_written: bool,
}

/// Totals over every file of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub cards: usize,
    pub failed_files: Vec<PathBuf>,
}

/// Process a single file, or every `*.md` file under a directory.
///
/// In directory mode a failing file is reported and skipped; the run
/// still fails at the end if any file did.
pub async fn process_path(config: &Config, engine: &SyncEngine) -> Result<RunSummary> {
    let path = &config.path;
    if !path.exists() {
        bail!("Path '{}' does not exist", path.display());
    }

    let context = Arc::new(SyncContext::new());
    let mut summary = RunSummary::default();

    if path.is_file() {
        let file = process_file(config, engine, Arc::clone(&context), path).await?;
        summary.files = 1;
        summary.cards = file.cards;
        return Ok(summary);
    }

    let mut files = Vec::new();
    collect_md_files(path, &mut files)
        .with_context(|| format!("Failed to read directory {}", path.display()))?;
    files.sort();
    println!("Found {} Markdown files", files.len());

    for file_path in files {
        if engine.cancellation_token().is_cancelled() {
            bail!("Sync cancelled");
        }
        summary.files += 1;
        match process_file(config, engine, Arc::clone(&context), &file_path).await {
            Ok(file) => summary.cards += file.cards,
            Err(e) => {
                tracing::error!(file = %file_path.display(), "{:#}", e);
                eprintln!("Error processing {}: {:#}", file_path.display(), e);
                summary.failed_files.push(file_path);
            }
        }
    }

    println!("\nTotal: {} cards processed", summary.cards);
    if !summary.failed_files.is_empty() {
        bail!(
            "{} of {} files failed",
            summary.failed_files.len(),
            summary.files
        );
    }
    Ok(summary)
}

/// Parse one file, write missing ids back, then sync its cards.
pub async fn process_file(
    config: &Config,
    engine: &SyncEngine,
    context: Arc<SyncContext>,
    path: &Path,
) -> Result<FileSummary> {
    let mut document = Document::load(path)
        .with_context(|| format!("Error processing file {}", path.display()))?;
    let mut outcome = document
        .parse(&config.root_deck, config.invalid_cards)
        .with_context(|| format!("Error processing file {}", path.display()))?;

    for dropped in &outcome.dropped {
        tracing::warn!(
            file = %path.display(),
            line = dropped.line,
            "Skipping card '{}': {}",
            dropped.title,
            dropped.reason
        );
    }

    let source_ref = document.source_ref();

    if config.dry_run {
        let cards = limit(&outcome.cards, config.limit);
        println!("Found {} cards in {}", cards.len(), path.display());
        for (i, card) in cards.iter().enumerate() {
            println!("\nCard {}/{}:", i + 1, cards.len());
            println!("{}", preview(card, &source_ref));
        }
        return Ok(FileSummary {
            cards: cards.len(),
            ..FileSummary::default()
        });
    }

    if outcome.cards.is_empty() {
        bail!("No cards found in {}", path.display());
    }

    let ids_written = document
        .reconcile(&mut outcome)
        .with_context(|| format!("Error updating ids in file {}", path.display()))?;
    if ids_written {
        document.save()?;
        tracing::info!(file = %path.display(), "Wrote new card ids");
    }

    let cards = outcome
        .cards
        .into_iter()
        .map(|card| card.into_card(Some(source_ref.clone())))
        .collect::<ankify_core::Result<Vec<Card>>>()?;
    let cards = match config.limit {
        Some(n) => cards.into_iter().take(n).collect(),
        None => cards,
    };

    let total = cards.len();
    let mut done = 0;
    let report = engine
        .sync_with_progress(cards, context, |outcome| {
            done += 1;
            match &outcome.result {
                Ok(note) => tracing::info!(
                    note_id = note.note_id,
                    "[{}/{}] {} {}",
                    done,
                    total,
                    match note.action {
                        SyncAction::Created => "created",
                        SyncAction::Updated => "updated",
                    },
                    outcome.card_id
                ),
                Err(_) => tracing::info!("[{}/{}] failed {}", done, total, outcome.card_id),
            }
        })
        .await
        .with_context(|| format!("Error during import of {}", path.display()))?;

    if report.cancelled {
        bail!("Sync cancelled");
    }
    if let Some((card_id, e)) = report.failures.first() {
        bail!(
            "Failed to sync {} of {} cards from {} (first: card {}: {})",
            report.failures.len(),
            total,
            path.display(),
            card_id,
            e
        );
    }

    println!("Successfully imported {} cards from {}", total, path.display());
    Ok(FileSummary {
        cards: total,
        created: report.created(),
        updated: report.updated(),
        ids_written,
    })
}

/// Collect all .md files under `dir` recursively.
fn collect_md_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_md_files(&path, files)?;
        } else if path.extension().map(|e| e == "md").unwrap_or(false) {
            files.push(path);
        }
    }
    Ok(())
}

fn limit(cards: &[ParsedCard], limit: Option<usize>) -> &[ParsedCard] {
    match limit {
        Some(n) if n < cards.len() => &cards[..n],
        _ => cards,
    }
}

/// Display form of a card that may not have an id yet.
fn preview(card: &ParsedCard, source_ref: &str) -> Card {
    Card {
        id: card.id.clone().unwrap_or_else(|| "(new)".to_string()),
        deck_path: card.deck_path.clone(),
        question: card.question.clone(),
        answer: card.answer.clone(),
        source_ref: Some(source_ref.to_string()),
        tags: Vec::new(),
    }
}
