//! Command line arguments and the run configuration derived from them.

use std::path::PathBuf;
use std::time::Duration;

use ankify_core::InvalidCardPolicy;
use clap::Parser;

use crate::anki::DEFAULT_URL;
use crate::retry::RetryPolicy;
use crate::sync::{SyncConfig, DEFAULT_CONCURRENCY};

pub const DEFAULT_ROOT_DECK: &str = "Ankify";

/// Sync flashcards written in markdown notes to Anki.
#[derive(Parser, Debug, Clone)]
#[command(name = "ankify")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Markdown file, or directory searched recursively for *.md files
    pub path: PathBuf,

    /// Deck that holds every card, unless the file's front matter names one
    #[arg(long, env = "ANKIFY_ROOT_DECK", default_value = DEFAULT_ROOT_DECK)]
    pub root_deck_name: String,

    /// Parse and print cards without touching Anki or the notes files
    #[arg(long)]
    pub dry_run: bool,

    /// Sync at most this many cards per file
    #[arg(long)]
    pub limit: Option<usize>,

    /// AnkiConnect endpoint
    #[arg(long, env = "ANKIFY_ANKI_URL", default_value = DEFAULT_URL)]
    pub anki_url: String,

    /// Cards synced at the same time
    #[arg(long, env = "ANKIFY_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Attempts per AnkiConnect request, the first one included
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Timeout for a single AnkiConnect request
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Abort the whole run after this many seconds
    #[arg(long)]
    pub run_timeout_secs: Option<u64>,

    /// Skip cards with an empty question or answer instead of failing the file
    #[arg(long)]
    pub skip_invalid: bool,
}

/// Everything a run needs, resolved from [`Args`].
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub root_deck: String,
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub anki_url: String,
    pub request_timeout: Duration,
    pub run_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub sync: SyncConfig,
    pub invalid_cards: InvalidCardPolicy,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            path: args.path,
            root_deck: args.root_deck_name,
            dry_run: args.dry_run,
            limit: args.limit,
            anki_url: args.anki_url,
            request_timeout: Duration::from_secs(args.timeout_secs),
            run_timeout: args.run_timeout_secs.map(Duration::from_secs),
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
                ..RetryPolicy::default()
            },
            sync: SyncConfig {
                concurrency: args.concurrency,
            },
            invalid_cards: if args.skip_invalid {
                InvalidCardPolicy::Skip
            } else {
                InvalidCardPolicy::Reject
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from(Args::parse_from(["ankify", "notes.md"]));
        assert_eq!(config.path, PathBuf::from("notes.md"));
        assert!(!config.dry_run);
        assert_eq!(config.limit, None);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.sync.concurrency, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.run_timeout, None);
        assert_eq!(config.invalid_cards, InvalidCardPolicy::Reject);
    }

    #[test]
    fn flags_are_applied() {
        let args = Args::parse_from([
            "ankify",
            "vault",
            "--root-deck-name",
            "Study",
            "--dry-run",
            "--limit",
            "5",
            "--anki-url",
            "http://127.0.0.1:9999",
            "--concurrency",
            "2",
            "--max-attempts",
            "1",
            "--run-timeout-secs",
            "30",
            "--skip-invalid",
        ]);
        let config = Config::from(args);
        assert_eq!(config.root_deck, "Study");
        assert!(config.dry_run);
        assert_eq!(config.limit, Some(5));
        assert_eq!(config.anki_url, "http://127.0.0.1:9999");
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.invalid_cards, InvalidCardPolicy::Skip);
    }

    #[test]
    fn missing_path_is_a_usage_error() {
        assert!(Args::try_parse_from(["ankify"]).is_err());
    }
}
