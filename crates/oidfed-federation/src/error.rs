//! Error type for trust chain and metadata resolution.

use crate::retrieval::RetrievalError;
use oidfed_policy::PolicyError;
use oidfed_types::EntityIdentifier;

/// Errors that can occur while resolving a trust chain or its metadata.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The request cannot be served as asked, e.g. the leaf is the anchor.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every path through the authority hints was exhausted.
    #[error("no trust chain from {leaf} to trust anchor {anchor}")]
    UnreachableTrustAnchor {
        leaf: EntityIdentifier,
        anchor: EntityIdentifier,
    },

    /// The chain's earliest expiry is not in the future.
    #[error("trust chain expired at {exp} (now {now})")]
    ExpiredChain { exp: i64, now: i64 },

    /// A supplied or rebuilt chain does not validate.
    #[error("invalid trust chain: {0}")]
    InvalidTrustChain(String),

    /// The leaf's own configuration, or a statement on the found path,
    /// could not be retrieved.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Metadata policy could not be merged or applied.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] PolicyError),
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Retrieval(e) if e.is_cancelled())
    }
}
