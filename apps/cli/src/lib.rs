pub mod anki;
pub mod commands;
pub mod config;
pub mod retry;
pub mod sync;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::anki::AnkiClient;
use crate::commands::RunSummary;
use crate::config::{Args, Config};
use crate::sync::SyncEngine;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling sync...");
                cancel.cancel();
            }
        })
    };

    let result = run_with_cancellation(Config::from(args), cancel).await;
    interrupt.abort();
    result.map(|_| ())
}

/// Run with an already resolved configuration.
pub async fn run_with(config: Config) -> anyhow::Result<RunSummary> {
    run_with_cancellation(config, CancellationToken::new()).await
}

/// Run until done or until `cancel` fires (or the configured run timeout passes).
pub async fn run_with_cancellation(
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let client = AnkiClient::new(&config.anki_url, config.request_timeout, config.retry.clone())?;
    let engine = SyncEngine::with_cancellation(client, config.sync.clone(), cancel.clone());

    let deadline = config.run_timeout.map(|timeout| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(timeout_secs = timeout.as_secs(), "Run timeout reached, cancelling sync");
            cancel.cancel();
        })
    });

    let result = commands::process_path(&config, &engine).await;

    if let Some(deadline) = deadline {
        deadline.abort();
    }
    result
}
