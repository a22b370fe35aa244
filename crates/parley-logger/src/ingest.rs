//! Ingestion hook: every observed message event ends up here.
//!
//! Events are queued on an `mpsc` channel and written one at a time by a
//! single task, each write running on the blocking pool.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use parley_shared::{AccountId, ChatTarget, LogEntry};
use parley_store::{AccountRegistry, LogManager};

use crate::error::LoggerError;
use crate::events::MessageEvent;

struct Ingest {
    account: AccountId,
    chat: ChatTarget,
    entry: LogEntry,
}

/// Outcome counters of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Events the preferred store accepted.
    pub persisted: u64,
    /// Events dropped by the manager (empty body, logging disabled, ...).
    pub rejected: u64,
}

pub struct Ingestor {
    tx: mpsc::Sender<Ingest>,
    task: JoinHandle<IngestStats>,
}

impl Ingestor {
    /// Spawn the writer task. Accounts seen in events are added to
    /// `accounts` so later searches can resolve them.
    pub fn spawn(manager: Arc<LogManager>, accounts: Arc<AccountRegistry>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Ingest>(capacity.max(1));

        let task = tokio::spawn(async move {
            let mut stats = IngestStats::default();

            while let Some(Ingest { account, chat, entry }) = rx.recv().await {
                if accounts.insert(account.clone()) {
                    info!(account = %account, "New account");
                }

                let manager = manager.clone();
                let written =
                    tokio::task::spawn_blocking(move || manager.add_message(&account, &chat, &entry))
                        .await;

                match written {
                    Ok(true) => stats.persisted += 1,
                    Ok(false) => stats.rejected += 1,
                    Err(e) => {
                        warn!(error = %e, "Write task failed");
                        stats.rejected += 1;
                    }
                }
            }

            stats
        });

        Self { tx, task }
    }

    /// Queue one message event for persistence.
    pub async fn on_message_event(
        &self,
        account: AccountId,
        chat: ChatTarget,
        entry: LogEntry,
    ) -> Result<(), LoggerError> {
        self.tx
            .send(Ingest { account, chat, entry })
            .await
            .map_err(|_| LoggerError::QueueClosed)
    }

    /// Close the queue, wait for pending writes and return the counters.
    pub async fn shutdown(self) -> Result<IngestStats, LoggerError> {
        drop(self.tx);
        self.task
            .await
            .map_err(|e| LoggerError::TaskFailed(e.to_string()))
    }
}

/// Feed every JSON line of `reader` to `ingestor` until end of input.
///
/// Malformed or invalid lines are logged and skipped. Returns the number of
/// events queued.
pub async fn run_line_source<R>(mut reader: R, ingestor: &Ingestor) -> Result<u64, LoggerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut queued = 0u64;
    let mut line_no = 0u64;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read event source");
                break;
            }
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping line that is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let parts = MessageEvent::from_line(line).and_then(MessageEvent::into_parts);
        match parts {
            Ok((account, chat, entry)) => {
                debug!(line = line_no, chat = %chat, "Event received");
                ingestor.on_message_event(account, chat, entry).await?;
                queued += 1;
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping event"),
        }
    }

    Ok(queued)
}
