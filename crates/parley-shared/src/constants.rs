/// Well-known prefix of account object paths, stripped when naming account directories
pub const ACCOUNT_OBJECT_PATH_BASE: &str = "/org/freedesktop/Telepathy/Account/";

/// Sub-directory of an account directory holding chatroom logs
pub const LOG_DIR_CHATROOMS: &str = "chatrooms";

/// Suffix of every date file
pub const LOG_FILENAME_SUFFIX: &str = ".log";

/// Timestamp format of the `time` attribute (always UTC)
pub const LOG_TIME_FORMAT_FULL: &str = "%Y%m%dT%H:%M:%S";

/// Date token format used in file names
pub const LOG_TIME_FORMAT: &str = "%Y%m%d";

/// Human readable rendering of a date token
pub const LOG_DATE_READABLE_FORMAT: &str = "%a %d %b %Y";

/// Opening of every log file, written once when the file is created
pub const LOG_HEADER: &str = "<?xml version='1.0' encoding='utf-8'?>\n\
<?xml-stylesheet type=\"text/xsl\" href=\"empathy-log.xsl\"?>\n\
<log>\n";

/// Closing of every log file, overwritten and re-appended on each write
pub const LOG_FOOTER: &str = "</log>\n";

/// Name of the current read-write store
pub const STORE_NAME_CURRENT: &str = "TpLogger";

/// Name of the legacy read-only store
pub const STORE_NAME_LEGACY: &str = "Empathy";

/// Directory under a store's data directory that holds the account trees
pub const STORE_LOGS_DIR: &str = "logs";
