//! Signed statement codec for the oidfed workspace.
//!
//! Statements travel as compact three-part tokens signed with Ed25519
//! (`alg: EdDSA`). This crate splits and decodes tokens, verifies them against
//! a [`KeyResolver`], and signs new ones with a [`StatementSigner`].

pub mod codec;
pub mod error;
pub mod keys;
pub mod signer;
pub mod statement;
pub mod verify;

pub use codec::{extract_unverified_claims, split, CompactParts, Header, UnverifiedClaims, EDDSA};
pub use error::StatementError;
pub use keys::{check_key_set, jwk_from_verifying_key, thumbprint, verifying_key_from_jwk, KeyResolver};
pub use signer::StatementSigner;
pub use statement::{EntityStatement, ResolveResponse, TrustMarkClaims, TrustMarkEntry};
pub use verify::{verify_claims, verify_entity_statement, verify_self_signed};
