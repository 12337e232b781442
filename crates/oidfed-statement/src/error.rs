//! Error types for the statement codec.

/// Errors that can occur while decoding, verifying, or signing a statement.
#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    /// The token is not three base64url segments with JSON header and body.
    #[error("malformed statement: {0}")]
    Malformed(String),

    /// The header names an algorithm other than `EdDSA`.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The header `typ` is missing or not the expected one.
    #[error("unexpected statement type: expected {expected}, found {found:?}")]
    UnexpectedType {
        expected: String,
        found: Option<String>,
    },

    /// No key in the key set has the header's `kid`.
    #[error("no key with kid '{0}'")]
    UnknownKey(String),

    /// More than one key in the key set has the header's `kid`.
    #[error("more than one key with kid '{0}'")]
    AmbiguousKey(String),

    /// The selected key cannot be used for Ed25519 verification.
    #[error("unusable key '{kid}': {reason}")]
    InvalidKey { kid: String, reason: String },

    /// The signature does not verify under the selected key.
    #[error("signature verification failed for kid '{0}'")]
    InvalidSignature(String),

    /// The body is missing required claims or has claims of the wrong shape.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// The `exp` claim is not in the future.
    #[error("statement expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },

    /// Claims could not be serialized while signing.
    #[error("failed to encode claims: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StatementError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}
