//! Cache manager
//!
//! Owns the map from composite cache key to [`ManagedDocument`]. Creation
//! goes through `DashMap::entry`, so concurrent callers asking for the same
//! key get the same entry and the entry is built exactly once.
//!
//! The manager is an explicit value: build one per runtime (or per test)
//! and pass it to whoever needs it.

use crate::config::{WorkDocConfig, CONFIG_FILE_NAME};
use crate::managed::ManagedDocument;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use workdoc_core::Result;
use workdoc_storage::{LockWait, RowKey, StorageLocation};

pub(crate) type Registry = DashMap<String, Arc<ManagedDocument>>;

/// Cache of managed documents keyed by composite cache key
pub struct CacheManager {
    entries: Arc<Registry>,
    config: WorkDocConfig,
    lock_wait: LockWait,
}

impl Default for CacheManager {
    fn default() -> Self {
        CacheManager {
            entries: Arc::new(DashMap::new()),
            config: WorkDocConfig::default(),
            lock_wait: LockWait::NoWait,
        }
    }
}

impl CacheManager {
    /// Create a manager using `config`
    ///
    /// # Errors
    /// `Config` if the lock mode is invalid.
    pub fn new(config: WorkDocConfig) -> Result<Self> {
        let lock_wait = config.lock_wait()?;
        Ok(CacheManager {
            entries: Arc::new(DashMap::new()),
            config,
            lock_wait,
        })
    }

    /// Create a manager from the `workdoc.toml` in `dir`
    ///
    /// Writes the default configuration first when the file is missing.
    ///
    /// # Errors
    /// `Config` if the file cannot be written, read or parsed, or names an
    /// invalid lock mode.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        WorkDocConfig::write_default_if_missing(&path)?;
        let config = WorkDocConfig::from_file(&path)?;
        info!(target: "workdoc::cache", path = %path.display(), lock_mode = %config.lock_mode, "cache manager configured");
        Self::new(config)
    }

    /// Configuration in effect
    pub fn config(&self) -> &WorkDocConfig {
        &self.config
    }

    /// Writable location for `row` using the configured storage kind
    pub fn location(&self, row: RowKey, root_name: impl Into<String>) -> StorageLocation {
        StorageLocation::new(row, root_name).with_kind(self.config.default_storage)
    }

    /// Entry for `location`, creating it if absent
    pub fn get_or_create(
        &self,
        location: &StorageLocation,
        auto_ids: bool,
    ) -> Arc<ManagedDocument> {
        let key = location.cache_key();
        let entry = self.entries.entry(key).or_insert_with(|| {
            debug!(target: "workdoc::cache", key = %location.cache_key(), "cache entry created");
            Arc::new(ManagedDocument::registered(
                location.clone(),
                auto_ids,
                self.lock_wait,
                Arc::downgrade(&self.entries),
            ))
        });
        Arc::clone(entry.value())
    }

    /// As [`CacheManager::get_or_create`] with the configured auto-ids flag
    pub fn get_or_create_default(&self, location: &StorageLocation) -> Arc<ManagedDocument> {
        self.get_or_create(location, self.config.auto_ids)
    }

    /// Entry for a cache key, if present
    pub fn get(&self, cache_key: &str) -> Option<Arc<ManagedDocument>> {
        self.entries.get(cache_key).map(|e| Arc::clone(e.value()))
    }

    /// Remove and return the entry for a cache key
    pub fn remove(&self, cache_key: &str) -> Option<Arc<ManagedDocument>> {
        self.entries.remove(cache_key).map(|(_, v)| v)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}
