//! Issuer-side directory of subordinates.
//!
//! An intermediate or trust anchor answers fetch requests from what it knows
//! about its subordinates. [`SubordinateDirectory`] keeps those records in a
//! cache in front of a [`SubordinateSource`], refreshing an entry once it is
//! older than the configured TTL.

use oidfed_policy::MetadataPolicy;
use oidfed_statement::EntityStatement;
use oidfed_types::{Clock, EntityIdentifier, Jwks, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// What an issuer knows about one subordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubordinateRecord {
    pub entity_id: EntityIdentifier,
    /// The subordinate's federation signing keys.
    pub jwks: Jwks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_policy: Option<MetadataPolicy>,
    /// Metadata the issuer asserts about the subordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub registered_at: i64,
}

impl SubordinateRecord {
    /// The statement `issuer` makes about this subordinate, valid from `iat`
    /// for `lifetime`.
    pub fn to_statement(&self, issuer: &EntityIdentifier, iat: i64, lifetime: Duration) -> EntityStatement {
        EntityStatement {
            iss: issuer.clone(),
            sub: self.entity_id.clone(),
            iat,
            exp: iat.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
            jwks: self.jwks.clone(),
            authority_hints: None,
            metadata: self.metadata.clone(),
            metadata_policy: self.metadata_policy.clone(),
            trust_marks: None,
            trust_mark_issuers: None,
        }
    }
}

/// Errors that can occur while looking up subordinates.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown subordinate: {0}")]
    NotFound(EntityIdentifier),

    #[error("subordinate source failed: {0}")]
    Source(String),

    #[error("subordinate cache lock poisoned")]
    LockPoisoned,
}

/// Where subordinate records come from.
pub trait SubordinateSource: Send + Sync {
    /// Loads the record for `id`, `None` if `id` is not a subordinate.
    fn load(&self, id: &EntityIdentifier) -> Result<Option<SubordinateRecord>, DirectoryError>;

    /// Every registered subordinate.
    fn list(&self) -> Result<Vec<EntityIdentifier>, DirectoryError>;
}

struct CacheEntry {
    record: Arc<SubordinateRecord>,
    cached_at: i64,
}

/// A TTL cache of subordinate records.
pub struct SubordinateDirectory {
    source: Arc<dyn SubordinateSource>,
    clock: Arc<dyn Clock>,
    ttl: i64,
    entries: RwLock<HashMap<EntityIdentifier, CacheEntry>>,
}

impl SubordinateDirectory {
    pub fn new(source: Arc<dyn SubordinateSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the record for `id`, reloading it from the source if it is
    /// not cached or its entry has expired.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] if the source does not know `id`; any
    /// cached entry is then evicted.
    pub fn get(&self, id: &EntityIdentifier) -> Result<Arc<SubordinateRecord>, DirectoryError> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().map_err(|_| DirectoryError::LockPoisoned)?;
            if let Some(entry) = entries.get(id) {
                if now.saturating_sub(entry.cached_at) < self.ttl {
                    return Ok(Arc::clone(&entry.record));
                }
            }
        }

        let loaded = self.source.load(id)?;
        let mut entries = self.entries.write().map_err(|_| DirectoryError::LockPoisoned)?;
        match loaded {
            Some(record) => {
                let record = Arc::new(record);
                entries.insert(
                    id.clone(),
                    CacheEntry {
                        record: Arc::clone(&record),
                        cached_at: now,
                    },
                );
                tracing::debug!(entity_id = %id, "subordinate cache refreshed");
                Ok(record)
            }
            None => {
                entries.remove(id);
                Err(DirectoryError::NotFound(id.clone()))
            }
        }
    }

    /// Drops the cached entry for `id`, if any.
    pub fn invalidate(&self, id: &EntityIdentifier) -> Result<(), DirectoryError> {
        self.entries
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .remove(id);
        Ok(())
    }

    /// Every registered subordinate, straight from the source.
    pub fn list(&self) -> Result<Vec<EntityIdentifier>, DirectoryError> {
        self.source.list()
    }
}
