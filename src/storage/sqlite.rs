use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::{schema, KeyValueStore, StorageError};

/// SQLite-backed [`KeyValueStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::debug!(path = %path.display(), "Opened client database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open `notedeck.db` in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(default_data_dir()?.join("notedeck.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }
}

/// Platform data directory for notedeck (e.g. `~/.local/share/notedeck`).
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "notedeck")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        let stored = conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?",
            [key],
            |row| row.get::<_, String>(0),
        )?;
        Ok(stored)
    }
}
