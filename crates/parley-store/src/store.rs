//! The log store abstraction.
//!
//! A [`LogStore`] is one backend's view over one base directory. The
//! [`crate::LogManager`] fans queries out to every registered store.

use parley_shared::{AccountId, ChatTarget, LogDate, LogEntry, SearchHit};

use crate::config::StoreCapability;
use crate::error::Result;

/// Decides whether an entry is kept by a filtered query.
pub type EntryFilter<'a> = &'a dyn Fn(&LogEntry) -> bool;

pub trait LogStore: Send + Sync {
    /// Unique name of this store within a manager.
    fn name(&self) -> &str;

    fn capability(&self) -> StoreCapability;

    /// Whether queries should be routed to this store.
    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        self.capability().is_writable()
    }

    /// Release per-file resources nobody is using.
    fn purge_idle(&self) {}

    /// Whether any log exists for `chat`.
    fn exists(&self, account: &AccountId, chat: &ChatTarget) -> bool;

    /// Dates with a log file for `chat`, ascending.
    fn get_dates(&self, account: &AccountId, chat: &ChatTarget) -> Vec<LogDate>;

    /// Entries of one date file, in append order.
    fn get_messages_for_date(
        &self,
        account: &AccountId,
        chat: &ChatTarget,
        date: &LogDate,
    ) -> Vec<LogEntry>;

    /// Every chat with logs under `account`.
    fn get_chats(&self, account: &AccountId) -> Vec<ChatTarget>;

    /// Date files whose contents contain `text`, ignoring case.
    fn search(&self, text: &str) -> Vec<SearchHit>;

    /// Like [`LogStore::search`], restricted to one chat.
    fn search_in_chat(&self, account: &AccountId, chat: &ChatTarget, text: &str) -> Vec<SearchHit>;

    /// Persist `entry`.
    ///
    /// Fails with [`crate::StoreError::EmptyBody`] for an empty body and
    /// [`crate::StoreError::NotWritable`] on a read-only store.
    fn add_message(&self, account: &AccountId, chat: &ChatTarget, entry: &LogEntry) -> Result<()>;

    /// The newest entries accepted by `filter`, oldest first.
    ///
    /// Date files are read newest first and whole; reading stops once at
    /// least `num_messages` entries were accepted, so the result may hold more
    /// than `num_messages` entries (never fewer, unless the chat has fewer).
    fn get_filtered_messages(
        &self,
        account: &AccountId,
        chat: &ChatTarget,
        num_messages: usize,
        filter: EntryFilter<'_>,
    ) -> Vec<LogEntry> {
        let dates = self.get_dates(account, chat);
        let mut result = Vec::new();
        let mut accepted = 0usize;

        for date in dates.iter().rev() {
            if accepted >= num_messages {
                break;
            }

            let mut entries = self.get_messages_for_date(account, chat, date);
            entries.retain(|entry| filter(entry));
            accepted += entries.len();

            entries.append(&mut result);
            result = entries;
        }

        result
    }
}
