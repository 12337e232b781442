//! Entity identifier validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::WELL_KNOWN_PATH;

/// Errors produced when validating an entity identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The string is not a parseable absolute URL.
    #[error("invalid entity identifier '{value}': {reason}")]
    Unparseable { value: String, reason: String },
    /// The URL scheme is not `https`.
    #[error("invalid entity identifier '{0}': scheme must be https")]
    NotHttps(String),
    /// The URL has no host component.
    #[error("invalid entity identifier '{0}': missing host")]
    MissingHost(String),
    /// The URL carries a fragment.
    #[error("invalid entity identifier '{0}': fragment not allowed")]
    HasFragment(String),
    /// The URL carries a query string.
    #[error("invalid entity identifier '{0}': query not allowed")]
    HasQuery(String),
}

/// A validated, normalized federation entity identifier.
///
/// Scheme and host are lowercased, the default port is dropped, and a bare
/// root path loses its slash, so `https://Example.com:443/` and
/// `https://example.com` are the same identifier. Any other path is kept as
/// written. Comparison is a string comparison of the normalized forms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityIdentifier(String);

impl EntityIdentifier {
    /// Validates and normalizes `value`.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentifierError`] if the value is not an `https` URL with
    /// a host and without a query or fragment.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let url = Url::parse(value).map_err(|e| IdentifierError::Unparseable {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "https" {
            return Err(IdentifierError::NotHttps(value.to_string()));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(IdentifierError::MissingHost(value.to_string()));
        }
        if url.fragment().is_some() {
            return Err(IdentifierError::HasFragment(value.to_string()));
        }
        if url.query().is_some() {
            return Err(IdentifierError::HasQuery(value.to_string()));
        }

        let mut normalized = url.as_str().to_string();
        if url.path() == "/" {
            normalized.pop();
        }
        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier as a parsed URL.
    pub fn to_url(&self) -> Url {
        // Validated at construction.
        Url::parse(&self.0).unwrap_or_else(|_| unreachable!("entity identifier is a valid URL"))
    }

    /// Location of this entity's configuration document.
    pub fn well_known_url(&self) -> Url {
        let base = self.0.trim_end_matches('/');
        Url::parse(&format!("{base}{WELL_KNOWN_PATH}"))
            .unwrap_or_else(|_| unreachable!("entity identifier with well-known suffix is a valid URL"))
    }
}

impl fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityIdentifier> for String {
    fn from(value: EntityIdentifier) -> Self {
        value.0
    }
}

impl AsRef<str> for EntityIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
