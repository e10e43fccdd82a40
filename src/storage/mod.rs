//! Storage
//!
//! Carts and checkout sessions are persisted as JSON blobs in a key-value store.

use std::io;

use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The key contains characters the store cannot represent.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// A key-value store of string blobs.
pub trait CartStore {
    /// Fetch the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `blob` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be written.
    fn save(&mut self, key: &str, blob: &str) -> Result<(), StorageError>;

    /// Delete the blob under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be written.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Whether `key` is usable in every store: ASCII letters, digits, `-` and `_`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
