//! Opening the subordinate store.
//!
//! The store is read on every fetch and list request that misses the
//! directory cache and written only by administration, so a file store runs
//! in WAL mode and every connection waits on a busy timeout instead of
//! failing while a writer holds the lock.

use crate::schema::{upgrade_schema, SchemaError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Where the subordinate store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// A named in-memory database shared by every connection of the pool.
    /// It lives as long as the pool holds a connection to it.
    Memory(String),
}

impl StoreLocation {
    /// Interprets a configured database path. `:memory:` selects a shared
    /// in-memory store.
    pub fn from_config(path: &str) -> Self {
        if path == ":memory:" {
            Self::Memory("oidfed".to_string())
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    fn manager(&self) -> SqliteConnectionManager {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        match self {
            Self::File(path) => SqliteConnectionManager::file(path).with_flags(flags),
            Self::Memory(name) => {
                SqliteConnectionManager::file(format!("file:{name}?mode=memory&cache=shared"))
                    .with_flags(flags | OpenFlags::SQLITE_OPEN_URI)
            }
        }
    }
}

/// Pool sizing and lock waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// How long a connection waits for a competing writer.
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_connections: 8,
        }
    }
}

/// Errors that can occur while opening the store.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open subordinate store: {0}")]
    Open(#[from] r2d2::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Opens a pool over `location` and brings its schema up to date.
///
/// # Errors
///
/// [`PoolError::Open`] if no connection can be established or configured,
/// [`PoolError::Schema`] if the schema cannot be upgraded.
pub fn open_pool(location: &StoreLocation, settings: PoolSettings) -> Result<DbPool, PoolError> {
    let on_disk = matches!(location, StoreLocation::File(_));
    let busy_timeout = settings.busy_timeout;
    let manager = location
        .manager()
        .with_init(move |conn| configure_connection(conn, on_disk, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.max_connections)
        .build(manager)?;

    let applied = upgrade_schema(&*pool.get()?)?;
    tracing::debug!(
        ?location,
        max_connections = settings.max_connections,
        schema_steps_applied = applied,
        "subordinate store opened"
    );
    Ok(pool)
}

fn configure_connection(conn: &mut Connection, on_disk: bool, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    if !on_disk {
        return Ok(());
    }

    let journal_mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("store refused WAL journal mode, got: {journal_mode}")),
        ));
    }
    // WAL makes NORMAL durable across application crashes.
    conn.pragma_update(None, "synchronous", "NORMAL")
}
