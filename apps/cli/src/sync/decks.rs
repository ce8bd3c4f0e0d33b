use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::anki::{AnkiClient, AnkiError};

/// Decks known to exist remotely, scoped to one sync run.
///
/// The remote list is fetched on first use. The lock is held across the
/// create call so two cards in the same new deck never both create it.
#[derive(Debug, Default)]
pub struct DeckCache {
    known: Mutex<Option<HashSet<String>>>,
}

impl DeckCache {
    /// Make sure `deck` exists. Returns true when it had to be created.
    pub async fn ensure(&self, client: &AnkiClient, deck: &str) -> Result<bool, AnkiError> {
        let mut known = self.known.lock().await;
        if known.is_none() {
            let names = client.deck_names().await?;
            *known = Some(names.into_iter().collect());
        }
        let decks = known.get_or_insert_with(HashSet::new);

        if decks.contains(deck) {
            return Ok(false);
        }

        tracing::info!(deck, "Creating deck");
        client.create_deck(deck).await?;
        decks.insert(deck.to_string());
        Ok(true)
    }

    /// Number of decks confirmed so far.
    pub async fn len(&self) -> usize {
        self.known.lock().await.as_ref().map_or(0, HashSet::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
