//! File-backed store: one XML date file per chat per day.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use parley_shared::constants::{LOG_DIR_CHATROOMS, LOG_FILENAME_SUFFIX};
use parley_shared::{AccountId, ChatTarget, LogDate, LogEntry, SearchHit};

use crate::accounts::AccountSource;
use crate::codec;
use crate::config::{StoreCapability, StoreConfig};
use crate::error::{Result, StoreError};
use crate::locks::FileLocks;
use crate::paths;
use crate::store::LogStore;

pub struct XmlLogStore {
    config: StoreConfig,
    accounts: Arc<dyn AccountSource>,
    locks: FileLocks,
}

impl XmlLogStore {
    pub fn new(config: StoreConfig, accounts: Arc<dyn AccountSource>) -> Self {
        info!(
            name = %config.name,
            basedir = %config.basedir.display(),
            capability = ?config.capability,
            "Log store initialized"
        );

        Self {
            config,
            accounts,
            locks: FileLocks::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn basedir(&self) -> &Path {
        &self.config.basedir
    }

    /// Path of the date file for `chat` on `date`.
    pub fn log_file_path(&self, account: &AccountId, chat: &ChatTarget, date: &LogDate) -> PathBuf {
        paths::log_file_path(self.basedir(), account, chat, date)
    }

    /// Every `.log` file below `dir`, at most `max_depth` levels down, in
    /// file name order.
    fn all_files(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(LOG_FILENAME_SUFFIX))
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    fn search_in_files(&self, text: &str, files: Vec<PathBuf>) -> Vec<SearchHit> {
        if text.is_empty() {
            warn!(store = %self.config.name, "Ignoring search for empty text");
            return Vec::new();
        }

        debug!(store = %self.config.name, files = files.len(), "Searching log files");

        // Bodies are stored escaped, so the query has to be too.
        let needle = caseless::default_case_fold_str(&codec::escape_markup(text));

        let mut hits = Vec::new();
        for path in files {
            let contents = match self.locks.read(&path, || fs::read(&path)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            if contents.is_empty() {
                continue;
            }

            let haystack = caseless::default_case_fold_str(&String::from_utf8_lossy(&contents));
            if !haystack.contains(&needle) {
                continue;
            }

            match self.hit_for_path(&path) {
                Some(hit) => {
                    debug!(text, path = %path.display(), date = %hit.date, "Found text");
                    hits.push(hit);
                }
                None => debug!(path = %path.display(), "Match outside the log layout"),
            }
        }

        hits
    }

    fn hit_for_path(&self, path: &Path) -> Option<SearchHit> {
        let identity = paths::identity_from_path(path)?;
        let account = self.accounts.resolve_dirname(&identity.account_dirname);
        if account.is_none() {
            debug!(dirname = %identity.account_dirname, "No known account for log directory");
        }

        Some(SearchHit {
            account,
            chat: identity.chat,
            date: identity.date,
            path: path.to_path_buf(),
        })
    }

    fn subdirectory_names(dir: &Path) -> Vec<String> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Failed to open directory");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()
    }
}

/// A contact whose directory doubles as the account's chatrooms directory.
fn is_chatrooms_contact(chat: &ChatTarget) -> bool {
    !chat.is_chatroom() && chat.chat_id() == LOG_DIR_CHATROOMS
}

impl LogStore for XmlLogStore {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn capability(&self) -> StoreCapability {
        self.config.capability
    }

    fn is_readable(&self) -> bool {
        self.config.readable
    }

    fn purge_idle(&self) {
        self.locks.purge_idle();
    }

    fn exists(&self, account: &AccountId, chat: &ChatTarget) -> bool {
        if is_chatrooms_contact(chat) {
            return !self.get_dates(account, chat).is_empty();
        }
        paths::chat_dir(self.basedir(), account, chat).is_dir()
    }

    fn get_dates(&self, account: &AccountId, chat: &ChatTarget) -> Vec<LogDate> {
        let dir = paths::chat_dir(self.basedir(), account, chat);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => {
                debug!(dir = %dir.display(), "Could not open directory");
                return Vec::new();
            }
        };

        debug!(dir = %dir.display(), "Collating a list of dates");

        let mut dates: Vec<LogDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| paths::date_from_filename(&name))
            .collect();
        dates.sort();

        debug!(count = dates.len(), "Parsed dates");
        dates
    }

    fn get_messages_for_date(
        &self,
        account: &AccountId,
        chat: &ChatTarget,
        date: &LogDate,
    ) -> Vec<LogEntry> {
        let path = self.log_file_path(account, chat, date);
        self.locks.read(&path, || codec::read_entries(&path))
    }

    fn get_chats(&self, account: &AccountId) -> Vec<ChatTarget> {
        let dir = paths::account_dir(self.basedir(), account);
        let mut chats = Vec::new();

        for name in Self::subdirectory_names(&dir) {
            if name == LOG_DIR_CHATROOMS {
                chats.extend(
                    Self::subdirectory_names(&dir.join(LOG_DIR_CHATROOMS))
                        .into_iter()
                        .filter_map(|room| ChatTarget::room(room).ok()),
                );

                // Also a contact when it holds date files of its own.
                if let Ok(contact) = ChatTarget::contact(name) {
                    if !self.get_dates(account, &contact).is_empty() {
                        chats.push(contact);
                    }
                }
            } else if let Ok(chat) = ChatTarget::contact(name) {
                chats.push(chat);
            }
        }

        chats.sort();
        chats
    }

    fn search(&self, text: &str) -> Vec<SearchHit> {
        let files = Self::all_files(self.basedir(), usize::MAX);
        self.search_in_files(text, files)
    }

    fn search_in_chat(&self, account: &AccountId, chat: &ChatTarget, text: &str) -> Vec<SearchHit> {
        // A chat directory holds date files only; a contact named like the
        // chatrooms directory must not pick up the rooms below it.
        let files = Self::all_files(&paths::chat_dir(self.basedir(), account, chat), 1);
        self.search_in_files(text, files)
    }

    fn add_message(&self, account: &AccountId, chat: &ChatTarget, entry: &LogEntry) -> Result<()> {
        if entry.body.is_empty() {
            return Err(StoreError::EmptyBody);
        }
        if !self.is_writable() {
            return Err(StoreError::NotWritable(self.config.name.clone()));
        }

        let path = self.log_file_path(account, chat, &entry.date());
        debug!(path = %path.display(), chat = %chat, "Adding message");

        self.locks.write(&path, || codec::append_entry(&path, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::StaticAccounts;
    use chrono::{TimeZone, Utc};
    use parley_shared::MessageType;
    use tempfile::TempDir;

    fn me() -> AccountId {
        AccountId::new("me@example.com").unwrap()
    }

    fn bob() -> ChatTarget {
        ChatTarget::contact("bob@example.com").unwrap()
    }

    fn entry(y: i32, m: u32, d: u32, secs: u32, body: &str) -> LogEntry {
        let ts = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(secs as i64);
        LogEntry::new(ts, "bob@example.com", body).with_alias("Bob")
    }

    fn test_store(capability: StoreCapability) -> (XmlLogStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new("TpLogger", dir.path().join("logs"), capability);
        let store = XmlLogStore::new(config, Arc::new(StaticAccounts(vec![me()])));
        (store, dir)
    }

    fn date(s: &str) -> LogDate {
        LogDate::parse(s).unwrap()
    }

    #[test]
    fn test_add_then_exists() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        assert!(!store.exists(&me(), &bob()));

        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "hi")).unwrap();

        assert!(store.exists(&me(), &bob()));
        assert!(!store.exists(&me(), &ChatTarget::room("bob@example.com").unwrap()));
    }

    #[test]
    fn test_purge_idle_forgets_released_locks() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "a")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "b")).unwrap();
        assert_eq!(store.locks.len(), 2);

        store.purge_idle();
        assert!(store.locks.is_empty());
    }

    #[test]
    fn test_empty_body_rejected() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let result = store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, ""));

        assert!(matches!(result, Err(StoreError::EmptyBody)));
        assert!(!store.exists(&me(), &bob()));
    }

    #[test]
    fn test_read_only_store_refuses_writes() {
        let (store, _dir) = test_store(StoreCapability::ReadOnly);
        let result = store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "hi"));

        assert!(matches!(result, Err(StoreError::NotWritable(name)) if name == "TpLogger"));
        assert!(!store.basedir().exists());
    }

    #[test]
    fn test_dates_and_files() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);

        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "c")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "a")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 5, "b")).unwrap();

        let chat_dir = paths::chat_dir(store.basedir(), &me(), &bob());
        let mut files: Vec<_> = fs::read_dir(&chat_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["20230101.log", "20230102.log"]);

        assert_eq!(store.get_dates(&me(), &bob()), vec![date("20230101"), date("20230102")]);

        let bodies: Vec<_> = store
            .get_messages_for_date(&me(), &bob(), &date("20230101"))
            .into_iter()
            .map(|e| e.body)
            .collect();
        assert_eq!(bodies, vec!["a", "b"]);
    }

    #[test]
    fn test_get_dates_skips_foreign_files() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 5, 0, "x")).unwrap();

        let chat_dir = paths::chat_dir(store.basedir(), &me(), &bob());
        for name in ["notes.log", "2023.log", "20230101.txt", "20230101.log.bak", "2023010a.log"] {
            fs::write(chat_dir.join(name), "junk").unwrap();
        }

        assert_eq!(store.get_dates(&me(), &bob()), vec![date("20230105")]);
    }

    #[test]
    fn test_missing_directories_are_empty() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);

        assert!(store.get_dates(&me(), &bob()).is_empty());
        assert!(store.get_messages_for_date(&me(), &bob(), &date("20230101")).is_empty());
        assert!(store.get_chats(&me()).is_empty());
        assert!(store.search("anything").is_empty());
    }

    #[test]
    fn test_malformed_file_does_not_hide_others() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "good")).unwrap();

        let broken = store.log_file_path(&me(), &bob(), &date("20230101"));
        fs::write(&broken, "<log><message>").unwrap();

        assert!(store.get_messages_for_date(&me(), &bob(), &date("20230101")).is_empty());
        let all = store.get_filtered_messages(&me(), &bob(), 10, &|_| true);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body, "good");
    }

    #[test]
    fn test_chatrooms_are_segregated() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let room = ChatTarget::room("bob@example.com").unwrap();

        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "private")).unwrap();
        store.add_message(&me(), &room, &entry(2023, 1, 1, 0, "public")).unwrap();

        assert_ne!(
            store.log_file_path(&me(), &bob(), &date("20230101")),
            store.log_file_path(&me(), &room, &date("20230101"))
        );
        assert_eq!(store.get_chats(&me()), vec![bob(), room.clone()]);

        let public = store.get_messages_for_date(&me(), &room, &date("20230101"));
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].body, "public");
    }

    #[test]
    fn test_filtered_messages_overshoot_whole_dates() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let k = 3;
        for day in 1..=3 {
            for i in 0..k {
                store
                    .add_message(&me(), &bob(), &entry(2023, 1, day, i, &format!("d{day}m{i}")))
                    .unwrap();
            }
        }

        let result = store.get_filtered_messages(&me(), &bob(), k as usize + 1, &|_| true);

        assert_eq!(result.len(), 2 * k as usize);
        let bodies: Vec<_> = result.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["d2m0", "d2m1", "d2m2", "d3m0", "d3m1", "d3m2"]);
    }

    #[test]
    fn test_filtered_messages_undershoot() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "only")).unwrap();

        let result = store.get_filtered_messages(&me(), &bob(), 10, &|_| true);
        assert_eq!(result.len(), 1);
        assert!(store.get_filtered_messages(&me(), &bob(), 0, &|_| true).is_empty());
    }

    #[test]
    fn test_filter_drops_without_counting() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "older")).unwrap();
        store
            .add_message(
                &me(),
                &bob(),
                &entry(2023, 1, 2, 0, "waves").with_type(MessageType::Action),
            )
            .unwrap();

        let normal_only = |e: &LogEntry| e.message_type == MessageType::Normal;
        let result = store.get_filtered_messages(&me(), &bob(), 1, &normal_only);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].body, "older");
    }

    #[test]
    fn test_newest_date_alone_meets_cap() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "one")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 1, "two")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "three")).unwrap();

        let result = store.get_filtered_messages(&me(), &bob(), 1, &|_| true);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].body, "three");
        assert_eq!(result[0].date(), date("20230102"));
    }

    #[test]
    fn test_search_finds_single_file() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let room = ChatTarget::room("#rust").unwrap();

        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "hello there")).unwrap();
        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "nothing here")).unwrap();
        store.add_message(&me(), &room, &entry(2023, 1, 3, 0, "Meet at the STRASSE")).unwrap();

        let hits = store.search("straße");

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.account, Some(me()));
        assert_eq!(hit.chat, room);
        assert_eq!(hit.date, date("20230103"));
        assert_eq!(hit.path, store.log_file_path(&me(), &room, &date("20230103")));
    }

    #[test]
    fn test_search_is_case_insensitive_and_escaped() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "Fish & Chips")).unwrap();

        assert_eq!(store.search("fish & chips").len(), 1);
        assert_eq!(store.search("FISH").len(), 1);
        assert!(store.search("").is_empty());
    }

    #[test]
    fn test_search_matches_existing_apostrophe_escaping() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let path = store.log_file_path(&me(), &bob(), &date("20230101"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "<?xml version='1.0' encoding='utf-8'?>\n\
             <log>\n\
             <message time='20230101T10:00:00' cm_id='' id='bob@example.com' name='Bob' \
             token='' isuser='false' type='normal'>don&#39;t panic</message>\n\
             </log>\n",
        )
        .unwrap();

        let entries = store.get_messages_for_date(&me(), &bob(), &date("20230101"));
        assert_eq!(entries[0].body, "don't panic");

        assert_eq!(store.search("DON'T").len(), 1);
        assert_eq!(store.search_in_chat(&me(), &bob(), "don't panic").len(), 1);

        // Freshly written entries use the same escaping.
        store.add_message(&me(), &bob(), &entry(2023, 1, 2, 0, "it's fine")).unwrap();
        assert_eq!(store.search("it's").len(), 1);
    }

    #[test]
    fn test_contact_named_like_chatrooms_dir() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let contact = ChatTarget::contact("chatrooms").unwrap();
        let room = ChatTarget::room("lobby").unwrap();

        store.add_message(&me(), &room, &entry(2023, 1, 1, 0, "room talk")).unwrap();
        assert!(!store.exists(&me(), &contact));
        assert_eq!(store.get_chats(&me()), vec![room.clone()]);

        store.add_message(&me(), &contact, &entry(2023, 1, 2, 0, "odd name")).unwrap();
        assert!(store.exists(&me(), &contact));
        assert_eq!(store.get_chats(&me()), vec![contact.clone(), room.clone()]);
        assert_eq!(store.get_dates(&me(), &contact), vec![date("20230102")]);

        let hits = store.search_in_chat(&me(), &contact, "talk");
        assert!(hits.is_empty());
        let hits = store.search("odd name");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chat, contact);
    }

    #[test]
    fn test_search_unknown_account_keeps_hit() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new("TpLogger", dir.path(), StoreCapability::ReadWrite);
        let store = XmlLogStore::new(config, Arc::new(StaticAccounts(Vec::new())));

        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "orphan")).unwrap();

        let hits = store.search("orphan");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].account, None);
        assert_eq!(hits[0].chat, bob());
    }

    #[test]
    fn test_search_in_chat_narrows() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let carol = ChatTarget::contact("carol@example.com").unwrap();

        store.add_message(&me(), &bob(), &entry(2023, 1, 1, 0, "lunch?")).unwrap();
        store.add_message(&me(), &carol, &entry(2023, 1, 1, 0, "lunch!")).unwrap();

        assert_eq!(store.search("lunch").len(), 2);
        let hits = store.search_in_chat(&me(), &carol, "lunch");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chat, carol);
    }

    #[test]
    fn test_concurrent_appends_keep_file_well_formed() {
        let (store, _dir) = test_store(StoreCapability::ReadWrite);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..5 {
                        let e = entry(2023, 1, 1, i * 10 + j, &format!("t{i}-{j}"));
                        store.add_message(&me(), &bob(), &e).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = store.get_messages_for_date(&me(), &bob(), &date("20230101"));
        assert_eq!(entries.len(), 40);
    }
}
