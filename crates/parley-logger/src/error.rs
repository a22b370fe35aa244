use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] parley_shared::TypeError),

    #[error("Ingestion queue is closed")]
    QueueClosed,

    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}
