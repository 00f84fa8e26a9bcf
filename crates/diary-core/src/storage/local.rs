//! Local key-value persistence
//!
//! Every value lives in its own JSON file under the data directory, one
//! file per fixed [`StoreKey`]. Reads always deserialize fresh from disk so
//! callers never share state between calls; writes replace the whole value
//! atomically (write to temp file, fsync, rename).
//!
//! Files:
//! - `diaries.json` - All diary records, newest first
//! - `session-user.json` - The logged-in identity (absent when logged out)
//! - `settings.json` - External service settings
//! - `user-registry.json` - Registered name + password hash records
//! - `remembered-names.json` - Recently used names for quick login

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use crate::config::Config;

/// The fixed namespaces of the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    Diaries,
    SessionUser,
    Settings,
    UserRegistry,
    RememberedNames,
}

impl StoreKey {
    pub const ALL: [StoreKey; 5] = [
        StoreKey::Diaries,
        StoreKey::SessionUser,
        StoreKey::Settings,
        StoreKey::UserRegistry,
        StoreKey::RememberedNames,
    ];

    /// Name of the key, also the file stem
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Diaries => "diaries",
            StoreKey::SessionUser => "session-user",
            StoreKey::Settings => "settings",
            StoreKey::UserRegistry => "user-registry",
            StoreKey::RememberedNames => "remembered-names",
        }
    }
}

/// Size information about the store's files
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Number of keys with a file on disk
    pub keys_present: usize,
    /// Combined size of all key files in bytes
    pub total_size: u64,
}

impl StorageStats {
    /// Total size in human-readable form
    pub fn total_size_human(&self) -> String {
        let size = self.total_size as f64;
        if size < 1024.0 {
            format!("{} B", self.total_size)
        } else if size < 1024.0 * 1024.0 {
            format!("{:.1} KB", size / 1024.0)
        } else {
            format!("{:.1} MB", size / (1024.0 * 1024.0))
        }
    }
}

/// JSON-file backed key-value store
///
/// Cloning is cheap; clones address the same data directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    config: Config,
}

impl LocalStore {
    /// Create a store over the configured data directory
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Create a store rooted at `data_dir` with otherwise default configuration
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(Config::with_data_dir(data_dir))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the file backing `key`
    pub fn path(&self, key: StoreKey) -> PathBuf {
        self.config.store_path(key.as_str())
    }

    /// Check whether a value is stored under `key`
    pub fn exists(&self, key: StoreKey) -> bool {
        self.path(key).exists()
    }

    /// Read the value under `key`, or the type's default when absent
    pub fn get<T>(&self, key: StoreKey) -> StorageResult<T>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.get_optional(key)?.unwrap_or_default())
    }

    /// Read the value under `key`, or `None` when absent
    pub fn get_optional<T>(&self, key: StoreKey) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| StorageError::from_read(e, path.clone()))?;
        let value = serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            key: key.as_str(),
            path,
            source,
        })?;
        Ok(Some(value))
    }

    /// Replace the value under `key`
    pub fn set<T>(&self, key: StoreKey, value: &T) -> StorageResult<()>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialize {
            key: key.as_str(),
            source,
        })?;

        let path = self.path(key);
        atomic_write(&path, &bytes)?;
        debug!(key = key.as_str(), bytes = bytes.len(), "stored value");
        Ok(())
    }

    /// Remove the value under `key` (no-op when absent)
    pub fn remove(&self, key: StoreKey) -> StorageResult<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| StorageError::from_io(e, path))?;
            debug!(key = key.as_str(), "removed value");
        }
        Ok(())
    }

    /// Read-modify-write a single key
    ///
    /// `f` returns `None` when it made no change, in which case nothing is
    /// written. Callers must be the only writer of the data directory; two
    /// processes modifying the same key can lose an update.
    pub fn modify<T, R, F>(&self, key: StoreKey, f: F) -> StorageResult<Option<R>>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Option<R>,
    {
        let mut value: T = self.get(key)?;
        match f(&mut value) {
            Some(result) => {
                self.set(key, &value)?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    /// Get storage statistics
    pub fn stats(&self) -> StorageStats {
        StoreKey::ALL
            .iter()
            .filter_map(|key| fs::metadata(self.path(*key)).ok())
            .fold(StorageStats::default(), |mut stats, meta| {
                stats.keys_present += 1;
                stats.total_size += meta.len();
                stats
            })
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("json.tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
