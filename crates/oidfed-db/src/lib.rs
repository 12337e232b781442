//! Database layer for the oidfed federation node.
//!
//! Stores the subordinates this node issues statements about in SQLite,
//! behind an `r2d2` pool whose schema is upgraded when it is opened.

mod pool;
mod schema;
mod subordinates;

pub use pool::{open_pool, DbPool, PoolError, PoolSettings, StoreLocation};
pub use schema::{schema_version, upgrade_schema, SchemaError};
pub use subordinates::{
    delete_subordinate, get_subordinate, list_subordinates, upsert_subordinate, SqliteSubordinateSource,
    StoreError,
};
