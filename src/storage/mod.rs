//! Persistent key-value storage for the session history.
//!
//! The history cache only needs "read my value" and "replace my value", so
//! the port is a two-method trait. `SqliteStore` is the durable backend;
//! `MemoryStore` is for tests and ephemeral sessions.

pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage is present but refusing writes (quota, disabled, read-only).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A single durable slot holding the serialized history.
pub trait HistoryStore: Send {
    /// Raw stored value, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Replace the stored value wholesale. Either the whole value lands or
    /// nothing does.
    fn save(&mut self, value: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// History slot backed by the `kv_store` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
    key: String,
}

impl SqliteStore {
    pub fn open(path: &Path, key: &str) -> Result<Self, StoreError> {
        info!(path = %path.display(), %key, "opening history store");
        let pool = open_pool(path)?;
        Ok(Self::with_pool(pool, key))
    }

    /// A private in-memory database. The pool is capped at one connection
    /// since every SQLite `:memory:` connection is its own database.
    pub fn open_in_memory(key: &str) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = R2D2Pool::builder().max_size(1).build(manager)?;
        let conn = pool.get()?;
        schema::migrate(&conn)?;
        drop(conn);
        Ok(Self::with_pool(pool, key))
    }

    pub fn with_pool(pool: Pool, key: &str) -> Self {
        Self {
            pool,
            key: key.to_string(),
        }
    }
}

impl HistoryStore for SqliteStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![self.key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        debug!(key = %self.key, found = value.is_some(), "loaded stored value");
        Ok(value)
    }

    fn save(&mut self, value: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.key, value],
        )?;
        debug!(key = %self.key, bytes = value.len(), "saved value");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryCell {
    value: Option<String>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory slot. Clones share the same cell, so a handle kept outside the
/// cache can observe (or sabotage) what the cache writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    cell: Arc<Mutex<MemoryCell>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a raw stored value, well-formed or not.
    pub fn with_value(value: impl Into<String>) -> Self {
        let store = Self::default();
        store.lock().value = Some(value.into());
        store
    }

    /// Current raw value.
    pub fn value(&self) -> Option<String> {
        self.lock().value.clone()
    }

    /// Number of successful saves so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Make subsequent saves fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCell> {
        self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock().value.clone())
    }

    fn save(&mut self, value: &str) -> Result<(), StoreError> {
        let mut cell = self.lock();
        if cell.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        cell.value = Some(value.to_string());
        cell.writes += 1;
        Ok(())
    }
}
