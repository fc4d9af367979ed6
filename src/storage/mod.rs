//! Durable client-side state.
//!
//! Everything the client persists (the session identifier and the deck
//! registry) goes through the [`KeyValueStore`] port. Two implementations are
//! provided:
//!
//! - [`SqliteStore`]: a single-table SQLite database in the user's data directory.
//! - [`MemoryStore`]: a process-local map, used by tests and ephemeral runs.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{default_data_dir, SqliteStore};

use thiserror::Error;

/// Storage key holding the persisted session identifier.
pub const SESSION_KEY: &str = "session_id";

/// Storage key holding the serialized deck registry.
pub const DECKS_KEY: &str = "decks";

/// Storage port errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// String key/value access to durable storage.
///
/// Implementations must make each call atomic on its own; callers that need a
/// read-modify-write sequence provide their own locking.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Store `value` only if `key` has no value yet.
    ///
    /// Returns the value in effect after the call: the existing one if the
    /// key was already set, otherwise `value`.
    fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError>;
}
