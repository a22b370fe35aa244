//! XML encoding of log entries.
//!
//! A date file is always a well-formed document: the header opens the `<log>`
//! root, each append seeks back over the trailing footer, writes one
//! `<message>` element and re-appends the footer.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use parley_shared::constants::{LOG_FOOTER, LOG_HEADER, LOG_TIME_FORMAT_FULL};
use parley_shared::{LogEntry, MessageType};

use crate::error::{Result, StoreError};

#[cfg(unix)]
const LOG_DIR_CREATE_MODE: u32 = 0o700;
#[cfg(unix)]
const LOG_FILE_CREATE_MODE: u32 = 0o600;

const MESSAGE_ELEMENT: &[u8] = b"message";

/// Render one `<message>` element followed by a newline.
pub fn format_entry(entry: &LogEntry) -> String {
    let cm_id = entry.cm_id.map(|id| id.to_string()).unwrap_or_default();
    let token = entry.avatar_token.as_deref().unwrap_or("");

    format!(
        "<message time='{}' cm_id='{}' id='{}' name='{}' token='{}' isuser='{}' type='{}'>{}</message>\n",
        entry.timestamp.format(LOG_TIME_FORMAT_FULL),
        cm_id,
        escape_markup(&entry.sender_id),
        escape_markup(&entry.sender_alias),
        escape_markup(token),
        if entry.sender_is_self { "true" } else { "false" },
        entry.message_type.as_str(),
        escape_markup(&entry.body),
    )
}

/// Escape text the way existing log files do: `&#39;` for apostrophes and
/// character references for restricted control characters.
///
/// Search needles go through the same escaping, so both must stay in sync
/// with what is on disk.
pub fn escape_markup(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| "&<>'\"".contains(c) || is_restricted_char(c)) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            c if is_restricted_char(c) => out.push_str(&format!("&#x{:x};", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Control characters that may not appear literally in an XML 1.0 document.
fn is_restricted_char(c: char) -> bool {
    matches!(
        c as u32,
        0x01..=0x08 | 0x0b..=0x0c | 0x0e..=0x1f | 0x7f..=0x84 | 0x86..=0x9f
    )
}

/// Append `entry` to the date file at `path`, creating the file (and its
/// parent directories) on first use.
///
/// Callers must serialise appends to the same path.
pub fn append_entry(path: &Path, entry: &LogEntry) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Creating directory");
            create_log_dir(dir)?;
        }
    }

    let mut file = if path.exists() {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.seek(SeekFrom::End(-(LOG_FOOTER.len() as i64)))?;
        file
    } else {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(LOG_HEADER.as_bytes())?;
        restrict_file_permissions(path)?;
        file
    };

    let mut record = format_entry(entry);
    record.push_str(LOG_FOOTER);
    file.write_all(record.as_bytes())?;
    file.flush()?;

    debug!(path = %path.display(), sender = %entry.sender_id, "Appended message");
    Ok(())
}

/// Decode every `<message>` of the file at `path`, in document order.
///
/// A missing or malformed file yields an empty list.
pub fn read_entries(path: &Path) -> Vec<LogEntry> {
    if !path.exists() {
        debug!(path = %path.display(), "Log file does not exist");
        return Vec::new();
    }

    let contents = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read log file");
            return Vec::new();
        }
    };

    let text = String::from_utf8_lossy(&contents);
    match parse_entries(&text) {
        Ok(entries) => {
            debug!(path = %path.display(), count = entries.len(), "Parsed messages");
            entries
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse log file");
            Vec::new()
        }
    }
}

/// Decode the `<message>` children of the document root.
pub fn parse_entries(xml: &str) -> Result<Vec<LogEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 1 {
                    saw_root = true;
                } else if depth == 2 && e.name().as_ref() == MESSAGE_ELEMENT {
                    current = Some(PartialEntry::from_element(&e)?);
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    saw_root = true;
                } else if depth == 1 && e.name().as_ref() == MESSAGE_ELEMENT {
                    entries.push(PartialEntry::from_element(&e)?.finish());
                }
            }
            Event::Text(t) => {
                if let Some(partial) = current.as_mut() {
                    partial.body.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(partial) = current.as_mut() {
                    partial.body.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(partial) = current.take() {
                        entries.push(partial.finish());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(StoreError::Xml("unexpected end of document".to_string()));
    }
    if !saw_root {
        return Err(StoreError::Xml("document has no root element".to_string()));
    }

    Ok(entries)
}

/// Attributes of a `<message>` whose body is still being collected.
struct PartialEntry {
    timestamp: DateTime<Utc>,
    sender_id: String,
    sender_alias: String,
    avatar_token: Option<String>,
    sender_is_self: bool,
    message_type: MessageType,
    cm_id: Option<u32>,
    body: String,
}

impl PartialEntry {
    fn from_element(element: &BytesStart<'_>) -> Result<Self> {
        let mut partial = PartialEntry {
            timestamp: DateTime::<Utc>::default(),
            sender_id: String::new(),
            sender_alias: String::new(),
            avatar_token: None,
            sender_is_self: false,
            message_type: MessageType::Normal,
            cm_id: None,
            body: String::new(),
        };

        for attr in element.attributes() {
            let attr = attr.map_err(|e| StoreError::Xml(e.to_string()))?;
            let value: Cow<'_, str> = attr.unescape_value()?;

            match attr.key.as_ref() {
                b"time" => partial.timestamp = parse_time(&value),
                b"id" => partial.sender_id = value.into_owned(),
                b"name" => partial.sender_alias = value.into_owned(),
                b"token" if !value.is_empty() => partial.avatar_token = Some(value.into_owned()),
                b"isuser" => partial.sender_is_self = value == "true",
                b"type" => partial.message_type = MessageType::from_str_lossy(&value),
                b"cm_id" => partial.cm_id = value.parse().ok(),
                _ => {}
            }
        }

        Ok(partial)
    }

    fn finish(self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp,
            sender_id: self.sender_id,
            sender_alias: self.sender_alias,
            sender_is_self: self.sender_is_self,
            body: self.body,
            message_type: self.message_type,
            cm_id: self.cm_id,
            avatar_token: self.avatar_token,
        }
    }
}

fn parse_time(value: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(value, LOG_TIME_FORMAT_FULL) {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            warn!(value, error = %e, "Unparseable message time, using epoch");
            DateTime::<Utc>::default()
        }
    }
}

#[cfg(unix)]
fn create_log_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(LOG_DIR_CREATE_MODE)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_log_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(LOG_FILE_CREATE_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
