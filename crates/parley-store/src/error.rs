use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic I/O error (creating a chat directory, appending to a file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A log file is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// A message with an empty body was offered for persistence.
    #[error("Refusing to log a message with an empty body")]
    EmptyBody,

    /// The store only supports reading.
    #[error("Log store '{0}' is read-only")]
    NotWritable(String),

    /// Two stores with the same name were registered on one manager.
    #[error("Log store '{0}' is already registered")]
    DuplicateStore(String),

    /// Failed to determine a platform data directory.
    #[error("Could not determine user data directory")]
    NoDataDir,

    /// Invalid identity or date token.
    #[error(transparent)]
    Type(#[from] parley_shared::TypeError),
}

impl From<quick_xml::Error> for StoreError {
    fn from(e: quick_xml::Error) -> Self {
        StoreError::Xml(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
