//! Per-file reader/writer locks.
//!
//! Appends seek to a fixed offset from the end of the file, so two writers on
//! the same date file must never interleave, and a reader must not observe a
//! half-written tail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

#[derive(Debug, Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding `path`, created on first use.
    pub fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Run `f` with exclusive access to `path`.
    pub fn write<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(path);
        let _guard = lock.write();
        f()
    }

    /// Run `f` with shared access to `path`.
    pub fn read<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(path);
        let _guard = lock.read();
        f()
    }

    /// Drop locks nobody else holds a handle to.
    pub fn purge_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
