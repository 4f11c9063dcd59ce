//! Key/value stores the auth token is discovered from.
//!
//! The "local" store survives restarts (SQLite file in the data directory),
//! the "session" store lives as long as the process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StorageError;

pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug)]
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM local_storage WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a session store from environment variables: key `authToken`
    /// is read from `<PREFIX>_AUTH_TOKEN`.
    pub fn from_env(prefix: &str, keys: &[String]) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            for key in keys {
                if let Ok(value) = std::env::var(env_var_name(prefix, key)) {
                    values.entry(key.clone()).or_insert(value);
                }
            }
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// `authToken` -> `PREFIX_AUTH_TOKEN`, `auth_token` -> `PREFIX_AUTH_TOKEN`.
pub fn env_var_name(prefix: &str, key: &str) -> String {
    let mut name = String::from(prefix);
    name.push('_');
    let mut previous_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            name.push('_');
        }
        previous_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        name.push(if c == '-' { '_' } else { c.to_ascii_uppercase() });
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.db");

        let store = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        store.set("token", "abc").unwrap();
        store.set("token", "def").unwrap();
        drop(store);

        let store = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("def"));
        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        store.set("jwt", "xyz").unwrap();
        assert_eq!(store.get("jwt").unwrap().as_deref(), Some("xyz"));
        store.remove("jwt").unwrap();
        assert!(store.get("jwt").unwrap().is_none());
    }

    #[test]
    fn env_names_follow_key_casing() {
        assert_eq!(env_var_name("EXPENSE_TUI", "authToken"), "EXPENSE_TUI_AUTH_TOKEN");
        assert_eq!(env_var_name("EXPENSE_TUI", "auth_token"), "EXPENSE_TUI_AUTH_TOKEN");
        assert_eq!(env_var_name("EXPENSE_TUI", "jwt"), "EXPENSE_TUI_JWT");
        assert_eq!(env_var_name("EXPENSE_TUI", "apiKey"), "EXPENSE_TUI_API_KEY");
    }
}
