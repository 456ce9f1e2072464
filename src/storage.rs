// 💾 Device Storage - small key-value store that outlives the app session
//
// Only used for contact unlock flags. Values are never migrated or
// versioned; a missing key simply reads as "not set".

use crate::error::ApiError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

pub trait DeviceStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;

    fn remove(&self, key: &str) -> Result<(), ApiError>;
}

/// `contact_unlocked_<profileId>`
pub fn contact_unlock_key(profile_id: i64) -> String {
    format!("contact_unlocked_{}", profile_id)
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, ApiError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, ApiError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ApiError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStorage {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiError> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal("device storage lock poisoned".to_string()))
    }
}

impl DeviceStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// MEMORY
// ============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let values = self
            .values
            .read()
            .map_err(|_| ApiError::Internal("memory storage lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| ApiError::Internal("memory storage lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| ApiError::Internal("memory storage lock poisoned".to_string()))?;
        values.remove(key);
        Ok(())
    }
}
