//! Shared types, error definitions, and constants for the oidfed workspace.
//!
//! This crate provides the foundational vocabulary used by every other crate:
//! validated entity identifiers, JWK key sets, per-entity-type metadata, and
//! the clock abstraction used wherever expiry is evaluated.
//!
//! No crate in the workspace depends on anything *except* `oidfed-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod clock;
mod identifier;
mod jwk;
mod metadata;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identifier::{EntityIdentifier, IdentifierError};
pub use jwk::{Jwk, Jwks};
pub use metadata::{EntityType, EntityTypeMetadata, Metadata};

/// Media type of a signed entity statement.
pub const ENTITY_STATEMENT_MEDIA_TYPE: &str = "application/entity-statement+jwt";

/// Media type of a signed resolve response.
pub const RESOLVE_RESPONSE_MEDIA_TYPE: &str = "application/resolve-response+jwt";

/// `typ` header value of an entity statement.
pub const ENTITY_STATEMENT_TYP: &str = "entity-statement+jwt";

/// `typ` header value of a resolve response.
pub const RESOLVE_RESPONSE_TYP: &str = "resolve-response+jwt";

/// `typ` header value of a trust mark.
pub const TRUST_MARK_TYP: &str = "trust-mark+jwt";

/// Path appended to an entity identifier to locate its entity configuration.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-federation";
