//! Ed25519 statement signing.

use crate::codec::{self, Header, EDDSA};
use crate::error::StatementError;
use crate::keys::{jwk_from_verifying_key, thumbprint};
use crate::statement::EntityStatement;
use ed25519_dalek::{Signer, SigningKey};
use oidfed_types::{Jwk, Jwks, ENTITY_STATEMENT_TYP};
use serde::Serialize;

/// Signs compact statements with one Ed25519 key.
#[derive(Clone)]
pub struct StatementSigner {
    key: SigningKey,
    kid: String,
}

impl StatementSigner {
    /// Generates a fresh key whose `kid` is its JWK thumbprint.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Loads a key from its 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let kid = thumbprint(&key.verifying_key());
        Self { key, kid }
    }

    /// Replaces the thumbprint `kid`.
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = kid.into();
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The 32-byte seed, for persisting the key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn public_jwk(&self) -> Jwk {
        jwk_from_verifying_key(&self.key.verifying_key(), self.kid.clone())
    }

    /// A key set holding only this signer's public key.
    pub fn jwks(&self) -> Jwks {
        Jwks::new(vec![self.public_jwk()])
    }

    /// Signs `claims` as a compact token with header `typ`.
    pub fn sign<T: Serialize + ?Sized>(&self, typ: &str, claims: &T) -> Result<String, StatementError> {
        let header = Header {
            alg: EDDSA.to_string(),
            kid: Some(self.kid.clone()),
            typ: Some(typ.to_string()),
        };
        let claims = serde_json::to_value(claims)?;
        codec::encode(&header, &claims, |input| self.key.sign(input).to_bytes().to_vec())
    }

    pub fn sign_entity_statement(&self, statement: &EntityStatement) -> Result<String, StatementError> {
        self.sign(ENTITY_STATEMENT_TYP, statement)
    }
}

impl std::fmt::Debug for StatementSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementSigner")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}
