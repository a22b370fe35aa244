//! On-disk layout of a store.
//!
//! ```text
//! <basedir>/<account_dirname>/<chat_id>/<DATE>.log
//! <basedir>/<account_dirname>/chatrooms/<chat_id>/<DATE>.log
//! ```

use std::path::{Path, PathBuf};

use parley_shared::constants::{LOG_DIR_CHATROOMS, LOG_FILENAME_SUFFIX};
use parley_shared::{AccountId, ChatTarget, LogDate};

/// Directory holding every chat of `account`.
pub fn account_dir(basedir: &Path, account: &AccountId) -> PathBuf {
    basedir.join(account.dirname())
}

/// Directory holding the date files of one chat.
pub fn chat_dir(basedir: &Path, account: &AccountId, chat: &ChatTarget) -> PathBuf {
    let mut dir = account_dir(basedir, account);
    if chat.is_chatroom() {
        dir.push(LOG_DIR_CHATROOMS);
    }
    dir.push(chat.chat_id());
    dir
}

/// Path of the date file of one chat.
pub fn log_file_path(
    basedir: &Path,
    account: &AccountId,
    chat: &ChatTarget,
    date: &LogDate,
) -> PathBuf {
    chat_dir(basedir, account, chat).join(format!("{}{}", date, LOG_FILENAME_SUFFIX))
}

/// Strip the `.log` suffix from a file name. Returns `None` for anything
/// that is not a log file or whose stem is not a date token.
pub fn date_from_filename(filename: &str) -> Option<LogDate> {
    filename
        .strip_suffix(LOG_FILENAME_SUFFIX)
        .and_then(|stem| LogDate::parse(stem).ok())
}

/// Identity recovered from a date file path, read from its last three or four
/// components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathIdentity {
    pub account_dirname: String,
    pub chat: ChatTarget,
    pub date: LogDate,
}

/// Reverse of [`log_file_path`].
pub fn identity_from_path(path: &Path) -> Option<PathIdentity> {
    let mut components = path
        .components()
        .rev()
        .map(|c| c.as_os_str().to_str());

    let date = date_from_filename(components.next()??)?;
    let chat_id = components.next()??;
    let parent = components.next()??;

    let (account_dirname, is_chatroom) = if parent == LOG_DIR_CHATROOMS {
        (components.next()??, true)
    } else {
        (parent, false)
    };

    let chat = ChatTarget::new(chat_id, is_chatroom).ok()?;
    Some(PathIdentity {
        account_dirname: account_dirname.to_string(),
        chat,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountId {
        AccountId::new("/org/freedesktop/Telepathy/Account/gabble/jabber/me0").unwrap()
    }

    #[test]
    fn test_contact_layout() {
        let base = Path::new("/logs");
        let chat = ChatTarget::contact("bob@example.com").unwrap();
        let date = LogDate::parse("20230101").unwrap();

        assert_eq!(
            log_file_path(base, &account(), &chat, &date),
            PathBuf::from("/logs/gabble_jabber_me0/bob@example.com/20230101.log")
        );
    }

    #[test]
    fn test_chatroom_layout() {
        let base = Path::new("/logs");
        let chat = ChatTarget::room("bob@example.com").unwrap();

        assert_eq!(
            chat_dir(base, &account(), &chat),
            PathBuf::from("/logs/gabble_jabber_me0/chatrooms/bob@example.com")
        );
    }

    #[test]
    fn test_date_from_filename() {
        assert_eq!(
            date_from_filename("20230101.log").map(|d| d.to_string()),
            Some("20230101".to_string())
        );
        assert!(date_from_filename("20230101.txt").is_none());
        assert!(date_from_filename("notes.log").is_none());
        assert!(date_from_filename("2023010.log").is_none());
    }

    #[test]
    fn test_identity_round_trip() {
        let base = Path::new("/var/lib/logs");
        for chat in [
            ChatTarget::contact("bob").unwrap(),
            ChatTarget::room("bob").unwrap(),
        ] {
            let date = LogDate::parse("20230102").unwrap();
            let path = log_file_path(base, &account(), &chat, &date);
            let identity = identity_from_path(&path).unwrap();

            assert_eq!(identity.account_dirname, "gabble_jabber_me0");
            assert_eq!(identity.chat, chat);
            assert_eq!(identity.date, date);
        }
    }

    #[test]
    fn test_identity_rejects_short_paths() {
        assert!(identity_from_path(Path::new("20230101.log")).is_none());
        assert!(identity_from_path(Path::new("bob/20230101.log")).is_none());
    }
}
