//! Sync engine: pushes cards to Anki as notes.
//!
//! Each card runs deck check, note lookup and create-or-update in order.
//! Cards run concurrently under a semaphore and fail independently.

mod decks;

pub use decks::DeckCache;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use ankify_core::Card;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::anki::{AnkiClient, AnkiError, NewNote, NoteUpdate};

/// Default number of cards in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Anki(#[from] AnkiError),

    #[error("Found multiple notes ({count}) with id field: {card_id}")]
    DuplicateRemoteNote { card_id: String, count: usize },

    #[error("Duplicate card id in sync batch: {0}")]
    DuplicateCardId(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
}

/// Remote note a card ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedNote {
    pub note_id: i64,
    pub action: SyncAction,
}

/// Result for one card, reported as soon as it completes.
#[derive(Debug)]
pub struct CardOutcome {
    pub card_id: String,
    pub result: Result<SyncedNote, SyncError>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Card id to remote note.
    pub notes: HashMap<String, SyncedNote>,
    pub failures: Vec<(String, SyncError)>,
    pub cancelled: bool,
}

impl SyncReport {
    /// Card id to remote note id.
    pub fn note_ids(&self) -> HashMap<String, i64> {
        self.notes
            .iter()
            .map(|(id, note)| (id.clone(), note.note_id))
            .collect()
    }

    pub fn created(&self) -> usize {
        self.count(SyncAction::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(SyncAction::Updated)
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    fn count(&self, action: SyncAction) -> usize {
        self.notes.values().filter(|n| n.action == action).count()
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum cards in flight.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// State shared by every card of one run.
#[derive(Debug, Default)]
pub struct SyncContext {
    pub decks: DeckCache,
}

impl SyncContext {
    pub fn new() -> Self {
        Self::default()
    }
}

struct SyncEngineInner {
    client: AnkiClient,
    config: SyncConfig,
    cancel: CancellationToken,
}

/// Cheap to clone; clones share the client and cancellation token.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(client: AnkiClient, config: SyncConfig) -> Self {
        Self::with_cancellation(client, config, CancellationToken::new())
    }

    pub fn with_cancellation(
        client: AnkiClient,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                client,
                config,
                cancel,
            }),
        }
    }

    /// Token that aborts every run of this engine once cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Sync `cards` with a fresh run context.
    pub async fn sync(&self, cards: Vec<Card>) -> Result<SyncReport, SyncError> {
        self.sync_with_progress(cards, Arc::new(SyncContext::new()), |_| {})
            .await
    }

    /// Sync `cards`, calling `on_progress` as each card completes (in any order).
    ///
    /// Batch-level problems (duplicate ids in `cards`, Anki unreachable,
    /// note type missing and not creatable) are returned as `Err`. Per-card
    /// failures are collected in the report and never stop other cards.
    pub async fn sync_with_progress<F>(
        &self,
        cards: Vec<Card>,
        context: Arc<SyncContext>,
        mut on_progress: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: FnMut(&CardOutcome),
    {
        check_unique_ids(&cards)?;

        let mut report = SyncReport::default();
        if cards.is_empty() {
            return Ok(report);
        }

        let cancel = self.inner.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = self.inner.client.ensure_model() => result?,
        }

        let total = cards.len();
        let semaphore = Arc::new(Semaphore::new(self.inner.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        tracing::info!(
            cards = total,
            concurrency = self.inner.config.concurrency,
            "Syncing cards"
        );

        for card in cards {
            let engine = self.clone();
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&semaphore);
            let card_id = card.id.clone();
            tasks.spawn(isolate(card_id, async move {
                engine.run_card(&semaphore, &context, &card).await
            }));
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Sync task aborted: {}", e);
                    continue;
                }
            };
            on_progress(&outcome);

            match outcome.result {
                Ok(note) => {
                    report.notes.insert(outcome.card_id, note);
                }
                Err(e) => {
                    tracing::warn!(card_id = %outcome.card_id, "Card failed: {}", e);
                    report.failures.push((outcome.card_id, e));
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        tracing::info!(
            created = report.created(),
            updated = report.updated(),
            failed = report.failures.len(),
            "Sync finished"
        );
        Ok(report)
    }

    async fn run_card(
        &self,
        semaphore: &Semaphore,
        context: &SyncContext,
        card: &Card,
    ) -> Result<SyncedNote, SyncError> {
        let cancel = &self.inner.cancel;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            permit = semaphore.acquire() => permit.map_err(|e| SyncError::Task(e.to_string()))?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            result = self.sync_card(context, card) => result,
        }
    }

    /// Deck, lookup by id, then create or update.
    async fn sync_card(&self, context: &SyncContext, card: &Card) -> Result<SyncedNote, SyncError> {
        let client = &self.inner.client;

        context
            .decks
            .ensure(client, &card.deck_path.materialize())
            .await?;

        let existing = client.find_notes_by_id(&card.id).await?;

        let synced = match existing.as_slice() {
            [] => SyncedNote {
                note_id: client.add_note(&NewNote::from_card(card)).await?,
                action: SyncAction::Created,
            },
            [note_id] => {
                client
                    .update_note(&NoteUpdate::from_card(*note_id, card))
                    .await?;
                SyncedNote {
                    note_id: *note_id,
                    action: SyncAction::Updated,
                }
            }
            many => {
                return Err(SyncError::DuplicateRemoteNote {
                    card_id: card.id.clone(),
                    count: many.len(),
                })
            }
        };

        tracing::debug!(card_id = %card.id, note_id = synced.note_id, action = ?synced.action, "Card synced");
        Ok(synced)
    }
}

/// Run one card's work on its own task so a panic fails only that card.
async fn isolate<F>(card_id: String, work: F) -> CardOutcome
where
    F: Future<Output = Result<SyncedNote, SyncError>> + Send + 'static,
{
    let result = match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) => Err(SyncError::Task(e.to_string())),
    };
    CardOutcome { card_id, result }
}

fn check_unique_ids(cards: &[Card]) -> Result<(), SyncError> {
    let mut seen = HashSet::with_capacity(cards.len());
    for card in cards {
        if !seen.insert(card.id.as_str()) {
            return Err(SyncError::DuplicateCardId(card.id.clone()));
        }
    }
    Ok(())
}
