//! Runtime configuration via `workdoc.toml`
//!
//! A missing file means defaults. To change settings, edit the file; it is
//! read once when the cache manager is built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use workdoc_core::{Error, Result};
use workdoc_storage::{LockWait, StorageKind};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "workdoc.toml";

/// Runtime configuration loaded from `workdoc.toml`.
///
/// # Example
///
/// ```toml
/// # Row lock wait: "nowait" (default) or "wait"
/// lock_mode = "wait"
/// lock_timeout_ms = 2000
/// auto_ids = true
/// default_storage = "binary"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkDocConfig {
    /// Row lock mode: `"nowait"` or `"wait"`.
    #[serde(default = "default_lock_mode")]
    pub lock_mode: String,
    /// Bounded wait for `"wait"` mode, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Assign refs to every node of writable documents.
    #[serde(default = "default_auto_ids")]
    pub auto_ids: bool,
    /// LOB encoding for new locations: `"character"` or `"binary"`.
    #[serde(default = "default_storage")]
    pub default_storage: StorageKind,
}

fn default_lock_mode() -> String {
    "nowait".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_auto_ids() -> bool {
    true
}

fn default_storage() -> StorageKind {
    StorageKind::Character
}

impl Default for WorkDocConfig {
    fn default() -> Self {
        Self {
            lock_mode: default_lock_mode(),
            lock_timeout_ms: default_lock_timeout_ms(),
            auto_ids: default_auto_ids(),
            default_storage: default_storage(),
        }
    }
}

impl WorkDocConfig {
    /// Parse the lock mode into a `LockWait`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is not `"nowait"` or `"wait"`.
    pub fn lock_wait(&self) -> Result<LockWait> {
        match self.lock_mode.as_str() {
            "nowait" => Ok(LockWait::NoWait),
            "wait" => Ok(LockWait::Wait(Duration::from_millis(self.lock_timeout_ms))),
            other => Err(Error::Config(format!(
                "Invalid lock mode '{}' in workdoc.toml. Expected \"nowait\" or \"wait\".",
                other
            ))),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# WorkDoc runtime configuration
#
# Row lock mode: "nowait" (default) or "wait"
#   "nowait" = fail at once when another transaction holds the row
#   "wait"   = wait up to lock_timeout_ms for the row
lock_mode = "nowait"
lock_timeout_ms = 5000

# Assign a ref to every node of writable documents (default: true)
auto_ids = true

# LOB encoding for new locations: "character" (JSON) or "binary" (MessagePack)
default_storage = "character"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: WorkDocConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.lock_wait()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
