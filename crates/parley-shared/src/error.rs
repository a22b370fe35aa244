use thiserror::Error;

/// Validation failures for the shared value types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Invalid chat id: {0:?}")]
    InvalidChatId(String),

    #[error("Invalid account id: {0:?}")]
    InvalidAccountId(String),

    #[error("Invalid date token: {0:?} (expected YYYYMMDD)")]
    InvalidDate(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
}
