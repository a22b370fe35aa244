//! Message events as they arrive on the line source.

use serde::{Deserialize, Serialize};

use parley_shared::{AccountId, ChatTarget, LogEntry};

use crate::error::LoggerError;

/// One observed message, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub account: String,
    pub chat_id: String,
    #[serde(default)]
    pub is_chatroom: bool,
    pub entry: LogEntry,
}

impl MessageEvent {
    pub fn from_line(line: &str) -> Result<Self, LoggerError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Validate the identities carried by the event. Resource parts of the
    /// chat id are folded into the directory name.
    pub fn into_parts(self) -> Result<(AccountId, ChatTarget, LogEntry), LoggerError> {
        let account = AccountId::new(self.account)?;
        let chat = ChatTarget::from_protocol_id(&self.chat_id, self.is_chatroom)?;
        Ok((account, chat, self.entry))
    }
}
