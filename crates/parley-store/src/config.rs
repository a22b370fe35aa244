//! Store and manager configuration.
//!
//! All settings have defaults matching the standard layout:
//! - `TpLogger` (read-write) at `<data dir>/TpLogger/logs`
//! - `Empathy` (legacy, read-only) at `<data dir>/Empathy/logs`

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use parley_shared::constants::{STORE_LOGS_DIR, STORE_NAME_CURRENT, STORE_NAME_LEGACY};

use crate::error::{Result, StoreError};

/// What a store may do with its base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreCapability {
    ReadOnly,
    ReadWrite,
}

impl StoreCapability {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Configuration of one XML log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Unique name among the stores of one manager.
    pub name: String,

    /// Root of the account directories.
    pub basedir: PathBuf,

    pub capability: StoreCapability,

    /// Whether queries are routed to this store.
    pub readable: bool,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, basedir: impl Into<PathBuf>, capability: StoreCapability) -> Self {
        Self {
            name: name.into(),
            basedir: basedir.into(),
            capability,
            readable: true,
        }
    }

    /// Store named `name` rooted at `<data_dir>/<name>/logs`.
    pub fn in_data_dir(data_dir: &Path, name: &str, capability: StoreCapability) -> Self {
        Self::new(name, data_dir.join(name).join(STORE_LOGS_DIR), capability)
    }

    /// The current read-write store.
    pub fn current(data_dir: &Path) -> Self {
        Self::in_data_dir(data_dir, STORE_NAME_CURRENT, StoreCapability::ReadWrite)
    }

    /// The legacy read-only store.
    pub fn legacy(data_dir: &Path) -> Self {
        Self::in_data_dir(data_dir, STORE_NAME_LEGACY, StoreCapability::ReadOnly)
    }
}

/// Configuration of a [`crate::LogManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Name of the store every new message is written to.
    pub preferred_write_store: String,

    /// When false, new messages are ignored.
    pub enabled: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            preferred_write_store: STORE_NAME_CURRENT.to_string(),
            enabled: true,
        }
    }
}

/// Platform data directory:
/// - Linux:   `~/.local/share`
/// - macOS:   `~/Library/Application Support`
/// - Windows: `{FOLDERID_RoamingAppData}`
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or(StoreError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}
