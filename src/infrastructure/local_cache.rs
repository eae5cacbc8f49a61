use crate::domain::models::{Task, TimerSession};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub fn tasks_key(uid: &str) -> String {
    format!("tasks_{uid}")
}

pub fn timer_sessions_key(uid: &str) -> String {
    format!("timer_sessions_{uid}")
}

/// Device-local key/value store holding JSON snapshots per user.
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn write(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<(), InfraError>;
    fn remove(&self, key: &str) -> Result<(), InfraError>;
}

fn read_json<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Result<Vec<T>, InfraError> {
    match cache.read(key)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

fn write_json<T: Serialize>(
    cache: &dyn LocalCache,
    key: &str,
    values: &[T],
    now: DateTime<Utc>,
) -> Result<(), InfraError> {
    let raw = serde_json::to_string(values)?;
    cache.write(key, &raw, now)
}

pub fn load_cached_tasks(cache: &dyn LocalCache, uid: &str) -> Result<Vec<Task>, InfraError> {
    read_json(cache, &tasks_key(uid))
}

pub fn save_cached_tasks(
    cache: &dyn LocalCache,
    uid: &str,
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Result<(), InfraError> {
    write_json(cache, &tasks_key(uid), tasks, now)
}

pub fn load_cached_sessions(
    cache: &dyn LocalCache,
    uid: &str,
) -> Result<Vec<TimerSession>, InfraError> {
    read_json(cache, &timer_sessions_key(uid))
}

pub fn save_cached_sessions(
    cache: &dyn LocalCache,
    uid: &str,
    sessions: &[TimerSession],
    now: DateTime<Utc>,
) -> Result<(), InfraError> {
    write_json(cache, &timer_sessions_key(uid), sessions, now)
}

#[derive(Debug, Clone)]
pub struct SqliteLocalCache {
    db_path: PathBuf,
}

impl SqliteLocalCache {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl LocalCache for SqliteLocalCache {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError> {
        let connection = self.connect()?;
        let value = connection
            .query_row(
                "SELECT value FROM local_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO local_cache (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM local_cache WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocalCache {
    entries: Mutex<HashMap<String, String>>,
}

impl LocalCache for InMemoryLocalCache {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local cache lock poisoned: {error}")))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str, _updated_at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local cache lock poisoned: {error}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local cache lock poisoned: {error}")))?;
        entries.remove(key);
        Ok(())
    }
}
