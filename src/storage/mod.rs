//! Durable key-value slot: where history snapshots and settings live.
//!
//! The history store only needs `get`/`set` of opaque bytes under a
//! fixed key. Backends implement [`KeyValueStore`]; the daemon uses
//! [`FileStore`], tests use an in-memory store.

mod file;
#[cfg(test)]
pub mod memory;

use std::path::PathBuf;

use directories::ProjectDirs;

pub use file::FileStore;

/// Errors returned by key-value backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Keys are restricted to `[A-Za-z0-9_-]` so they map to file names.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no home directory resolvable")]
    NoHomeDir,
}

/// A byte-oriented key-value store.
///
/// `Send + Sync` because the daemon shares one instance between the
/// history store and the settings writer.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// Check that a key is usable as a file name.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Resolve the default data directory: the platform data dir for
/// `clipkeep` (`$XDG_DATA_HOME/clipkeep` or `~/.local/share/clipkeep`
/// on Linux).
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("", "", "clipkeep")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoHomeDir)
}
