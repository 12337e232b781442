//! Storage of registered subordinates.

use crate::pool::DbPool;
use oidfed_federation::{DirectoryError, SubordinateRecord, SubordinateSource};
use oidfed_types::EntityIdentifier;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

/// Errors that can occur while reading or writing subordinates.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to get a database connection: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("failed to encode or decode a stored column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored entity id is invalid: {0}")]
    InvalidEntityId(String),
}

/// Inserts `record`, replacing any record for the same entity.
pub fn upsert_subordinate(conn: &Connection, record: &SubordinateRecord) -> Result<(), StoreError> {
    let jwks = serde_json::to_string(&record.jwks)?;
    let metadata_policy = record
        .metadata_policy
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let metadata = record.metadata.as_ref().map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO subordinates (entity_id, jwks, metadata_policy, metadata, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(entity_id) DO UPDATE SET
            jwks = excluded.jwks,
            metadata_policy = excluded.metadata_policy,
            metadata = excluded.metadata,
            updated_at = datetime('now')",
        params![
            record.entity_id.as_str(),
            jwks,
            metadata_policy,
            metadata,
            record.registered_at
        ],
    )?;
    Ok(())
}

/// Looks up the record for `entity_id`.
pub fn get_subordinate(
    conn: &Connection,
    entity_id: &EntityIdentifier,
) -> Result<Option<SubordinateRecord>, StoreError> {
    let row = conn
        .query_row(
            "SELECT entity_id, jwks, metadata_policy, metadata, registered_at
             FROM subordinates WHERE entity_id = ?1",
            [entity_id.as_str()],
            StoredRow::from_row,
        )
        .optional()?;
    row.map(StoredRow::into_record).transpose()
}

/// Entity ids of every subordinate, in lexicographic order.
pub fn list_subordinates(conn: &Connection) -> Result<Vec<EntityIdentifier>, StoreError> {
    let mut stmt = conn.prepare("SELECT entity_id FROM subordinates ORDER BY entity_id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| EntityIdentifier::parse(id).map_err(|e| StoreError::InvalidEntityId(e.to_string())))
        .collect()
}

/// Removes the record for `entity_id`. Returns whether one existed.
pub fn delete_subordinate(conn: &Connection, entity_id: &EntityIdentifier) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM subordinates WHERE entity_id = ?1",
        [entity_id.as_str()],
    )?;
    Ok(deleted > 0)
}

struct StoredRow {
    entity_id: String,
    jwks: String,
    metadata_policy: Option<String>,
    metadata: Option<String>,
    registered_at: i64,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entity_id: row.get(0)?,
            jwks: row.get(1)?,
            metadata_policy: row.get(2)?,
            metadata: row.get(3)?,
            registered_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<SubordinateRecord, StoreError> {
        Ok(SubordinateRecord {
            entity_id: EntityIdentifier::parse(&self.entity_id)
                .map_err(|e| StoreError::InvalidEntityId(e.to_string()))?,
            jwks: serde_json::from_str(&self.jwks)?,
            metadata_policy: self
                .metadata_policy
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            metadata: self.metadata.as_deref().map(serde_json::from_str).transpose()?,
            registered_at: self.registered_at,
        })
    }
}

/// [`SubordinateSource`] backed by the `subordinates` table.
#[derive(Clone)]
pub struct SqliteSubordinateSource {
    pool: DbPool,
}

impl SqliteSubordinateSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SubordinateSource for SqliteSubordinateSource {
    fn load(&self, id: &EntityIdentifier) -> Result<Option<SubordinateRecord>, DirectoryError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| DirectoryError::Source(StoreError::from(e).to_string()))?;
        get_subordinate(&conn, id).map_err(|e| DirectoryError::Source(e.to_string()))
    }

    fn list(&self) -> Result<Vec<EntityIdentifier>, DirectoryError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| DirectoryError::Source(StoreError::from(e).to_string()))?;
        list_subordinates(&conn).map_err(|e| DirectoryError::Source(e.to_string()))
    }
}
