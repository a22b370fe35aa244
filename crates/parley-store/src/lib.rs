//! # parley-store
//!
//! Persistent chat history on disk, one XML file per chat per day.
//!
//! Files live at `<basedir>/<account>/[chatrooms/]<chat>/<YYYYMMDD>.log`.
//! Each [`XmlLogStore`] owns one base directory; a [`LogManager`] fans
//! queries out over several stores (typically the current store and a
//! read-only legacy one) and routes new messages to a single preferred
//! store.

pub mod accounts;
pub mod codec;
pub mod config;
pub mod locks;
pub mod manager;
pub mod paths;
pub mod store;
pub mod xml_store;

mod error;

pub use accounts::{AccountRegistry, AccountSource, StaticAccounts};
pub use config::{default_data_dir, ManagerConfig, StoreCapability, StoreConfig};
pub use error::{Result, StoreError};
pub use manager::LogManager;
pub use store::{EntryFilter, LogStore};
pub use xml_store::XmlLogStore;
