//! Versioned schema of the subordinate store.
//!
//! The schema version lives in SQLite's `user_version` header field. Step `n`
//! of [`STEPS`] upgrades a database from version `n - 1` to `n`; each step
//! and its version bump commit together.

use rusqlite::Connection;
use thiserror::Error;

/// Upgrade steps, oldest first. Append only.
const STEPS: &[&str] = &[include_str!("schema/v1_subordinates.sql")];

/// Errors that can occur while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema version: {0}")]
    Version(rusqlite::Error),

    /// The database was written by a newer build.
    #[error("database schema version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },

    #[error("failed to upgrade schema to version {version}: {source}")]
    Upgrade {
        version: u32,
        source: rusqlite::Error,
    },
}

/// Schema version this build reads and writes.
pub fn schema_version() -> u32 {
    version_count(STEPS)
}

/// Upgrades the schema behind `conn` to [`schema_version`] and returns the
/// number of steps applied.
pub fn upgrade_schema(conn: &Connection) -> Result<u32, SchemaError> {
    apply_steps(conn, STEPS)
}

fn version_count(steps: &[&str]) -> u32 {
    u32::try_from(steps.len()).unwrap_or(u32::MAX)
}

fn current_version(conn: &Connection) -> Result<u32, SchemaError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(SchemaError::Version)
}

fn apply_steps(conn: &Connection, steps: &[&str]) -> Result<u32, SchemaError> {
    let supported = version_count(steps);
    let found = current_version(conn)?;
    if found > supported {
        return Err(SchemaError::TooNew { found, supported });
    }

    for (version, sql) in (1u32..).zip(steps.iter()).skip(found as usize) {
        let failed = |source| SchemaError::Upgrade { version, source };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", version).map_err(failed)?;
        tx.commit().map_err(failed)?;
        tracing::info!(version, "upgraded subordinate store schema");
    }

    Ok(supported - found)
}
