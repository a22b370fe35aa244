//! # parley-logger
//!
//! Chat history logger service.
//!
//! This binary:
//! - registers the current read-write XML store and, optionally, the
//!   read-only legacy store behind one `LogManager`
//! - reads message events as JSON lines from stdin
//! - persists every event through a single serial writer task
//! - shuts down cleanly on end of input or Ctrl+C

mod config;
mod error;
mod events;
mod ingest;

use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_store::{AccountRegistry, LogManager};

use crate::config::LoggerConfig;
use crate::ingest::Ingestor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_logger=debug,parley_store=info")),
        )
        .init();

    info!("Starting Parley logger v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = LoggerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize stores
    // -----------------------------------------------------------------------
    let accounts = Arc::new(config.accounts.iter().cloned().collect::<AccountRegistry>());
    let manager = Arc::new(LogManager::with_xml_stores(
        config.manager_config(),
        config.store_configs(),
        accounts.clone(),
    )?);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic lock table cleanup (every 10 minutes)
    let m = manager.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            m.purge_idle();
        }
    });

    // Serial writer fed by the event source
    let ingestor = Ingestor::spawn(manager, accounts, config.queue_capacity);

    // -----------------------------------------------------------------------
    // 5. Feed events until end of input or Ctrl+C
    // -----------------------------------------------------------------------
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = ingest::run_line_source(stdin, &ingestor) => {
            let queued = result?;
            info!(queued, "End of input");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    let stats = ingestor.shutdown().await?;
    info!(
        persisted = stats.persisted,
        rejected = stats.rejected,
        "Logger stopped"
    );

    Ok(())
}
