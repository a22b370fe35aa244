use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCOUNT_OBJECT_PATH_BASE, LOG_DATE_READABLE_FORMAT, LOG_TIME_FORMAT,
};
use crate::error::TypeError;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Opaque, stable identity of the account a conversation happened on.
///
/// In practice this is the account's object path
/// (`/org/freedesktop/Telepathy/Account/gabble/jabber/me_40example_2ecom0`),
/// but any unique string works.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() || id == ACCOUNT_OBJECT_PATH_BASE {
            return Err(TypeError::InvalidAccountId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe directory name: the well-known object path prefix is
    /// stripped and every `/` becomes `_`.
    pub fn dirname(&self) -> String {
        let name = self
            .0
            .strip_prefix(ACCOUNT_OBJECT_PATH_BASE)
            .unwrap_or(&self.0);
        name.replace('/', "_")
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ChatTarget
// ---------------------------------------------------------------------------

/// A conversation: one contact, or one named room.
///
/// The chat id becomes a directory name, so it can never be empty, contain a
/// path separator, or be a relative path component.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatTarget {
    chat_id: String,
    is_chatroom: bool,
}

impl ChatTarget {
    pub fn new(chat_id: impl Into<String>, is_chatroom: bool) -> Result<Self, TypeError> {
        let chat_id = chat_id.into();
        if chat_id.is_empty()
            || chat_id == "."
            || chat_id == ".."
            || chat_id.contains('/')
            || chat_id.contains('\\')
        {
            return Err(TypeError::InvalidChatId(chat_id));
        }
        Ok(Self {
            chat_id,
            is_chatroom,
        })
    }

    /// One-to-one conversation with a contact.
    pub fn contact(chat_id: impl Into<String>) -> Result<Self, TypeError> {
        Self::new(chat_id, false)
    }

    /// Multi-party room.
    pub fn room(chat_id: impl Into<String>) -> Result<Self, TypeError> {
        Self::new(chat_id, true)
    }

    /// Chat target for an identifier as the protocol reports it.
    ///
    /// Protocol ids may carry a resource (`room@conference.example.com/Alias`
    /// for a private chat opened from a room); every `/` becomes `_` so the
    /// id still names a single directory.
    pub fn from_protocol_id(id: &str, is_chatroom: bool) -> Result<Self, TypeError> {
        Self::new(id.replace('/', "_"), is_chatroom)
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn is_chatroom(&self) -> bool {
        self.is_chatroom
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_chatroom {
            write!(f, "room:{}", self.chat_id)
        } else {
            write!(f, "{}", self.chat_id)
        }
    }
}

// ---------------------------------------------------------------------------
// LogDate
// ---------------------------------------------------------------------------

/// `YYYYMMDD` token naming one date file.
///
/// Ordering is lexicographic, which for this fixed-width format is also
/// chronological.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LogDate(String);

impl LogDate {
    /// Accepts exactly eight ASCII digits.
    pub fn parse(token: &str) -> Result<Self, TypeError> {
        if token.len() == 8 && token.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(token.to_string()))
        } else {
            Err(TypeError::InvalidDate(token.to_string()))
        }
    }

    /// UTC calendar date of `timestamp`.
    pub fn from_timestamp(timestamp: &DateTime<Utc>) -> Self {
        Self(timestamp.format(LOG_TIME_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The calendar date, if the token names a real one.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, LOG_TIME_FORMAT).ok()
    }

    /// Human readable form, e.g. `Sun 01 Jan 2023`.
    pub fn readable(&self) -> Option<String> {
        self.to_naive_date()
            .map(|d| d.format(LOG_DATE_READABLE_FORMAT).to_string())
    }
}

impl FromStr for LogDate {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for LogDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    #[default]
    Normal,
    Action,
    Notice,
    AutoReply,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Action => "action",
            Self::Notice => "notice",
            Self::AutoReply => "auto-reply",
        }
    }

    /// Parse the `type` attribute, falling back to `Normal` for anything
    /// unrecognised.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for MessageType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "action" => Ok(Self::Action),
            "notice" => Ok(Self::Notice),
            "auto-reply" => Ok(Self::AutoReply),
            other => Err(TypeError::UnknownMessageType(other.to_string())),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One persisted message event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// When the message was sent, whole seconds, UTC.
    pub timestamp: DateTime<Utc>,
    /// Protocol identifier of the sender.
    pub sender_id: String,
    /// Display name of the sender at the time of the message.
    pub sender_alias: String,
    /// Whether the local user sent this message.
    #[serde(default)]
    pub sender_is_self: bool,
    /// Message text. Entries with an empty body are never persisted.
    pub body: String,
    #[serde(default)]
    pub message_type: MessageType,
    /// Pending-message id assigned by the connection manager. `None` means
    /// the message is already acknowledged.
    #[serde(default)]
    pub cm_id: Option<u32>,
    /// Avatar token of the sender, if one was known.
    #[serde(default)]
    pub avatar_token: Option<String>,
}

impl LogEntry {
    /// A normal, acknowledged message from `sender_id`, aliased to itself.
    pub fn new(
        timestamp: DateTime<Utc>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let sender_id = sender_id.into();
        Self {
            timestamp,
            sender_alias: sender_id.clone(),
            sender_id,
            sender_is_self: false,
            body: body.into(),
            message_type: MessageType::Normal,
            cm_id: None,
            avatar_token: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.sender_alias = alias.into();
        self
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_cm_id(mut self, cm_id: u32) -> Self {
        self.cm_id = Some(cm_id);
        self
    }

    pub fn from_self(mut self) -> Self {
        self.sender_is_self = true;
        self
    }

    /// The date file this entry belongs to.
    pub fn date(&self) -> LogDate {
        LogDate::from_timestamp(&self.timestamp)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.cm_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// A date file whose contents matched a search.
///
/// `account` is `None` when the account directory could not be matched to
/// any currently known account.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    pub account: Option<AccountId>,
    pub chat: ChatTarget,
    pub date: LogDate,
    pub path: PathBuf,
}
