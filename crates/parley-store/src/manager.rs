//! Fan-out over every registered log store.
//!
//! The manager is built once at startup with a fixed, ordered list of stores
//! and handed by `Arc` to whatever needs it. Queries go to every readable
//! store; new messages go to the one store named by
//! [`ManagerConfig::preferred_write_store`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_shared::{AccountId, ChatTarget, LogDate, LogEntry, SearchHit};

use crate::accounts::AccountSource;
use crate::config::{ManagerConfig, StoreConfig};
use crate::error::{Result, StoreError};
use crate::store::{EntryFilter, LogStore};
use crate::xml_store::XmlLogStore;

pub struct LogManager {
    config: ManagerConfig,
    stores: Vec<Arc<dyn LogStore>>,
}

impl LogManager {
    /// Register `stores` in order. Store names must be unique.
    pub fn new(config: ManagerConfig, stores: Vec<Arc<dyn LogStore>>) -> Result<Self> {
        let mut names = HashSet::new();
        for store in &stores {
            if !names.insert(store.name().to_string()) {
                return Err(StoreError::DuplicateStore(store.name().to_string()));
            }
            info!(
                name = store.name(),
                readable = store.is_readable(),
                writable = store.is_writable(),
                "Log store registered"
            );
        }

        if !names.contains(&config.preferred_write_store) {
            warn!(
                store = %config.preferred_write_store,
                "Preferred write store is not registered, messages will not be logged"
            );
        }

        Ok(Self { config, stores })
    }

    /// Build XML stores from `store_configs` and register them in order.
    pub fn with_xml_stores(
        config: ManagerConfig,
        store_configs: Vec<StoreConfig>,
        accounts: Arc<dyn AccountSource>,
    ) -> Result<Self> {
        let stores = store_configs
            .into_iter()
            .map(|c| Arc::new(XmlLogStore::new(c, accounts.clone())) as Arc<dyn LogStore>)
            .collect();
        Self::new(config, stores)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registered stores in registration order.
    pub fn stores(&self) -> &[Arc<dyn LogStore>] {
        &self.stores
    }

    pub fn store(&self, name: &str) -> Option<&Arc<dyn LogStore>> {
        self.stores.iter().find(|s| s.name() == name)
    }

    fn readable_stores(&self) -> impl Iterator<Item = &Arc<dyn LogStore>> {
        self.stores.iter().filter(|s| s.is_readable())
    }

    /// Persist `entry` in the preferred write store.
    ///
    /// Returns `false` when logging is disabled, the preferred store is not
    /// registered, or the store rejected the entry.
    pub fn add_message(&self, account: &AccountId, chat: &ChatTarget, entry: &LogEntry) -> bool {
        if !self.config.enabled {
            debug!(chat = %chat, "Logging disabled, ignoring message");
            return false;
        }

        let Some(store) = self.store(&self.config.preferred_write_store) else {
            debug!(
                store = %self.config.preferred_write_store,
                "Failed to find chosen log store to write to"
            );
            return false;
        };

        match store.add_message(account, chat, entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(store = store.name(), chat = %chat, error = %e, "Failed to write message");
                false
            }
        }
    }

    pub fn exists(&self, account: &AccountId, chat: &ChatTarget) -> bool {
        self.readable_stores().any(|s| s.exists(account, chat))
    }

    /// Union of every store's dates, ascending, without duplicates.
    pub fn get_dates(&self, account: &AccountId, chat: &ChatTarget) -> Vec<LogDate> {
        let mut out: Vec<LogDate> = Vec::new();
        for store in self.readable_stores() {
            for date in store.get_dates(account, chat) {
                if let Err(pos) = out.binary_search(&date) {
                    out.insert(pos, date);
                }
            }
        }
        out
    }

    /// Each store's entries for `date`, concatenated in registration order.
    pub fn get_messages_for_date(
        &self,
        account: &AccountId,
        chat: &ChatTarget,
        date: &LogDate,
    ) -> Vec<LogEntry> {
        self.readable_stores()
            .flat_map(|s| s.get_messages_for_date(account, chat, date))
            .collect()
    }

    /// Every store's chats, concatenated. A chat present in two stores is
    /// listed twice.
    pub fn get_chats(&self, account: &AccountId) -> Vec<ChatTarget> {
        self.readable_stores()
            .flat_map(|s| s.get_chats(account))
            .collect()
    }

    pub fn search(&self, text: &str) -> Vec<SearchHit> {
        self.readable_stores().flat_map(|s| s.search(text)).collect()
    }

    pub fn search_in_chat(&self, account: &AccountId, chat: &ChatTarget, text: &str) -> Vec<SearchHit> {
        self.readable_stores()
            .flat_map(|s| s.search_in_chat(account, chat, text))
            .collect()
    }

    pub fn purge_idle(&self) {
        for store in &self.stores {
            store.purge_idle();
        }
    }

    /// [`LogManager::search`] on the blocking thread pool.
    pub async fn search_async(self: &Arc<Self>, text: impl Into<String>) -> Vec<SearchHit> {
        let manager = Arc::clone(self);
        let text = text.into();

        match tokio::task::spawn_blocking(move || manager.search(&text)).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Search task failed");
                Vec::new()
            }
        }
    }

    /// The `num_messages` newest entries accepted by `filter` across all
    /// stores, oldest first.
    ///
    /// Unlike a single store's query, the result never holds more than
    /// `num_messages` entries. Entries with equal timestamps keep the order
    /// in which they were first seen.
    pub fn get_filtered_messages(
        &self,
        account: &AccountId,
        chat: &ChatTarget,
        num_messages: usize,
        filter: EntryFilter<'_>,
    ) -> Vec<LogEntry> {
        let mut out: Vec<LogEntry> = Vec::with_capacity(num_messages);
        if num_messages == 0 {
            return out;
        }

        for store in self.readable_stores() {
            for entry in store.get_filtered_messages(account, chat, num_messages, filter) {
                if out.len() < num_messages {
                    insert_by_timestamp(&mut out, entry);
                } else if entry.timestamp > out[0].timestamp {
                    out.remove(0);
                    insert_by_timestamp(&mut out, entry);
                }
            }
        }

        out
    }
}

/// Insert after every entry with an equal or older timestamp.
fn insert_by_timestamp(out: &mut Vec<LogEntry>, entry: LogEntry) {
    let pos = out.partition_point(|e| e.timestamp <= entry.timestamp);
    out.insert(pos, entry);
}
