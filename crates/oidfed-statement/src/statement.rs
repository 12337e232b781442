//! Claim sets carried by signed statements.

use oidfed_policy::MetadataPolicy;
use oidfed_types::{EntityIdentifier, Jwks, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A trust mark as listed in an entity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkEntry {
    /// Trust mark identifier.
    pub id: String,
    /// The signed trust mark itself.
    pub trust_mark: String,
}

/// Body of an entity statement.
///
/// An entity configuration is issued by an entity about itself
/// (`iss == sub`); a subordinate statement is issued by a superior about one
/// of its subordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStatement {
    pub iss: EntityIdentifier,
    pub sub: EntityIdentifier,
    pub iat: i64,
    pub exp: i64,
    /// The subject's federation signing keys.
    pub jwks: Jwks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_hints: Option<Vec<EntityIdentifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_policy: Option<MetadataPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_marks: Option<Vec<TrustMarkEntry>>,
    /// Trust mark id to the entities allowed to issue it. Published by trust
    /// anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_mark_issuers: Option<BTreeMap<String, Vec<EntityIdentifier>>>,
}

impl EntityStatement {
    pub fn is_entity_configuration(&self) -> bool {
        self.iss == self.sub
    }

    pub fn authority_hints(&self) -> &[EntityIdentifier] {
        self.authority_hints.as_deref().unwrap_or_default()
    }

    pub fn fetch_endpoint(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(Metadata::fetch_endpoint)
    }

    pub fn trust_marks(&self) -> &[TrustMarkEntry] {
        self.trust_marks.as_deref().unwrap_or_default()
    }
}

/// Body of a trust mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkClaims {
    pub iss: EntityIdentifier,
    pub sub: EntityIdentifier,
    pub id: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a resolve response: a leaf's resolved metadata and the chain it
/// was resolved through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// The resolver.
    pub iss: EntityIdentifier,
    /// The resolved leaf.
    pub sub: EntityIdentifier,
    pub iat: i64,
    /// Expiry of the trust chain.
    pub exp: i64,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trust_marks: Vec<TrustMarkEntry>,
    /// Signed statements, leaf configuration first.
    pub trust_chain: Vec<String>,
}
