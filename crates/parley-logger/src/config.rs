//! Logger configuration loaded from environment variables.
//!
//! All settings have defaults, so the logger can start with zero
//! configuration.

use std::path::PathBuf;

use parley_shared::constants::STORE_NAME_CURRENT;
use parley_shared::AccountId;
use parley_store::{default_data_dir, ManagerConfig, StoreConfig};

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// User data directory holding the store trees.
    /// Env: `PARLEY_DATA_DIR`
    /// Default: platform data directory (`~/.local/share` on Linux).
    pub data_dir: PathBuf,

    /// Name of the store new messages are written to.
    /// Env: `PARLEY_WRITE_STORE`
    /// Default: `TpLogger`
    pub write_store: String,

    /// Whether new messages are logged at all.
    /// Env: `PARLEY_ENABLED` (true/false)
    /// Default: `true`
    pub enabled: bool,

    /// Whether the read-only legacy store is registered.
    /// Env: `PARLEY_LEGACY_STORE` (true/false)
    /// Default: `true`
    pub legacy_store: bool,

    /// Accounts known at startup, comma separated.
    /// Env: `PARLEY_ACCOUNTS`
    /// Default: none (accounts are learned from events).
    pub accounts: Vec<AccountId>,

    /// Capacity of the ingestion queue.
    pub queue_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            write_store: STORE_NAME_CURRENT.to_string(),
            enabled: true,
            legacy_store: true,
            accounts: Vec::new(),
            queue_capacity: 256,
        }
    }
}

impl LoggerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match var("PARLEY_DATA_DIR") {
            Some(path) => config.data_dir = PathBuf::from(path),
            None => match default_data_dir() {
                Ok(dir) => config.data_dir = dir,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        default = %config.data_dir.display(),
                        "No user data directory, using default"
                    );
                }
            },
        }

        if let Some(name) = var("PARLEY_WRITE_STORE") {
            if name.is_empty() {
                tracing::warn!("Empty PARLEY_WRITE_STORE, using default");
            } else {
                config.write_store = name;
            }
        }

        if let Some(val) = var("PARLEY_ENABLED") {
            config.enabled = parse_flag("PARLEY_ENABLED", &val, config.enabled);
        }

        if let Some(val) = var("PARLEY_LEGACY_STORE") {
            config.legacy_store = parse_flag("PARLEY_LEGACY_STORE", &val, config.legacy_store);
        }

        if let Some(list) = var("PARLEY_ACCOUNTS") {
            for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match AccountId::new(raw) {
                    Ok(account) => config.accounts.push(account),
                    Err(e) => {
                        tracing::warn!(value = raw, error = %e, "Invalid account in PARLEY_ACCOUNTS, skipping");
                    }
                }
            }
        }

        config
    }

    /// Stores to register, in order: the current store, then the legacy one.
    pub fn store_configs(&self) -> Vec<StoreConfig> {
        let mut stores = vec![StoreConfig::current(&self.data_dir)];
        if self.legacy_store {
            stores.push(StoreConfig::legacy(&self.data_dir));
        }
        stores
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            preferred_write_store: self.write_store.clone(),
            enabled: self.enabled,
        }
    }
}

/// Parse a `true`/`false` (or `1`/`0`) flag, keeping `default` otherwise.
fn parse_flag(name: &str, val: &str, default: bool) -> bool {
    match val.trim() {
        "true" | "1" => true,
        "false" | "0" => false,
        _ => {
            tracing::warn!(var = name, value = %val, default, "Invalid boolean, using default");
            default
        }
    }
}
