//! JSON Web Key representations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single JSON Web Key.
///
/// Members this workspace interprets are typed; everything else is kept in
/// `extra` so a key set survives a parse/serialize cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, e.g. `OKP`.
    pub kty: String,
    /// Key identifier. Must be unique within a key set.
    #[serde(default)]
    pub kid: String,
    /// Curve name for `OKP`/`EC` keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Public key material, base64url encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Intended algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use (`sig`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Returns every key whose `kid` equals `kid`.
    pub fn keys_with_kid<'a>(&'a self, kid: &'a str) -> impl Iterator<Item = &'a Jwk> + 'a {
        self.keys.iter().filter(move |k| k.kid == kid)
    }

    /// Whether a key with `kid` is present.
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys.iter().any(|k| k.kid == kid)
    }

    /// Key ids that occur more than once.
    pub fn duplicate_kids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for key in &self.keys {
            if !seen.insert(key.kid.as_str()) && !dupes.contains(&key.kid.as_str()) {
                dupes.push(key.kid.as_str());
            }
        }
        dupes
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
