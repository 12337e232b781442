//! Per-entity-type metadata documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Metadata parameters of one entity type. Values are arbitrary JSON.
pub type EntityTypeMetadata = Map<String, Value>;

/// Entity types whose metadata is subject to metadata policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Federation-level parameters (endpoints, organization name).
    FederationEntity,
    /// An OpenID provider.
    OpenidProvider,
    /// An OpenID relying party.
    OpenidRelyingParty,
}

impl EntityType {
    /// All known entity types, in serialization order.
    pub const ALL: [EntityType; 3] = [
        EntityType::FederationEntity,
        EntityType::OpenidProvider,
        EntityType::OpenidRelyingParty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FederationEntity => "federation_entity",
            Self::OpenidProvider => "openid_provider",
            Self::OpenidRelyingParty => "openid_relying_party",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "federation_entity" => Ok(Self::FederationEntity),
            "openid_provider" => Ok(Self::OpenidProvider),
            "openid_relying_party" => Ok(Self::OpenidRelyingParty),
            _ => Err(format!("unknown entity type: {}", s)),
        }
    }
}

/// The `metadata` claim of an entity statement.
///
/// Entity types outside [`EntityType`] are kept in `other` untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_entity: Option<EntityTypeMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_provider: Option<EntityTypeMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_relying_party: Option<EntityTypeMetadata>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Metadata {
    pub fn get(&self, entity_type: EntityType) -> Option<&EntityTypeMetadata> {
        match entity_type {
            EntityType::FederationEntity => self.federation_entity.as_ref(),
            EntityType::OpenidProvider => self.openid_provider.as_ref(),
            EntityType::OpenidRelyingParty => self.openid_relying_party.as_ref(),
        }
    }

    pub fn set(&mut self, entity_type: EntityType, value: Option<EntityTypeMetadata>) {
        let slot = match entity_type {
            EntityType::FederationEntity => &mut self.federation_entity,
            EntityType::OpenidProvider => &mut self.openid_provider,
            EntityType::OpenidRelyingParty => &mut self.openid_relying_party,
        };
        *slot = value;
    }

    /// Returns a string parameter of the `federation_entity` metadata.
    fn federation_endpoint(&self, name: &str) -> Option<&str> {
        self.federation_entity
            .as_ref()
            .and_then(|m| m.get(name))
            .and_then(Value::as_str)
    }

    /// `federation_fetch_endpoint`, if published.
    pub fn fetch_endpoint(&self) -> Option<&str> {
        self.federation_endpoint("federation_fetch_endpoint")
    }

    /// `federation_list_endpoint`, if published.
    pub fn list_endpoint(&self) -> Option<&str> {
        self.federation_endpoint("federation_list_endpoint")
    }

    /// `federation_resolve_endpoint`, if published.
    pub fn resolve_endpoint(&self) -> Option<&str> {
        self.federation_endpoint("federation_resolve_endpoint")
    }
}
