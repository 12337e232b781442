//! Key selection and JWK conversion for Ed25519.

use crate::error::StatementError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::VerifyingKey;
use oidfed_types::{Jwk, Jwks};
use sha2::{Digest, Sha256};

/// Supplies the verification key for a `kid`.
pub trait KeyResolver {
    /// Returns the key identified by `kid`.
    ///
    /// # Errors
    ///
    /// [`StatementError::UnknownKey`] if no key matches,
    /// [`StatementError::AmbiguousKey`] if the key set repeats a `kid`, and
    /// [`StatementError::InvalidKey`] if the key is not a usable Ed25519 key
    /// or a member of the set has no `kid`.
    fn resolve_key(&self, kid: &str) -> Result<VerifyingKey, StatementError>;
}

impl KeyResolver for Jwks {
    fn resolve_key(&self, kid: &str) -> Result<VerifyingKey, StatementError> {
        check_key_set(self)?;
        let jwk = self
            .keys_with_kid(kid)
            .next()
            .ok_or_else(|| StatementError::UnknownKey(kid.to_string()))?;
        verifying_key_from_jwk(jwk)
    }
}

/// Rejects key sets in which a key has no `kid` or a `kid` occurs twice.
pub fn check_key_set(jwks: &Jwks) -> Result<(), StatementError> {
    if jwks.keys.iter().any(|k| k.kid.is_empty()) {
        return Err(StatementError::InvalidKey {
            kid: String::new(),
            reason: "key set member has no kid".to_string(),
        });
    }
    match jwks.duplicate_kids().first() {
        Some(dup) => Err(StatementError::AmbiguousKey((*dup).to_string())),
        None => Ok(()),
    }
}

impl<R: KeyResolver + ?Sized> KeyResolver for &R {
    fn resolve_key(&self, kid: &str) -> Result<VerifyingKey, StatementError> {
        (**self).resolve_key(kid)
    }
}

/// Converts an `OKP`/`Ed25519` JWK into a verifying key.
pub fn verifying_key_from_jwk(jwk: &Jwk) -> Result<VerifyingKey, StatementError> {
    let invalid = |reason: &str| StatementError::InvalidKey {
        kid: jwk.kid.clone(),
        reason: reason.to_string(),
    };

    if jwk.kty != "OKP" {
        return Err(invalid("kty is not OKP"));
    }
    if jwk.crv.as_deref() != Some("Ed25519") {
        return Err(invalid("crv is not Ed25519"));
    }
    let x = jwk.x.as_deref().ok_or_else(|| invalid("missing x"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(x)
        .map_err(|e| invalid(&format!("x is not base64url: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| invalid("x is not 32 bytes"))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| invalid(&e.to_string()))
}

/// Builds the public JWK of `key` with the given `kid`.
pub fn jwk_from_verifying_key(key: &VerifyingKey, kid: impl Into<String>) -> Jwk {
    Jwk {
        kty: "OKP".to_string(),
        kid: kid.into(),
        crv: Some("Ed25519".to_string()),
        x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
        alg: Some(crate::EDDSA.to_string()),
        use_: Some("sig".to_string()),
        extra: Default::default(),
    }
}

/// RFC 7638 JWK thumbprint (SHA-256, base64url) of an Ed25519 key.
pub fn thumbprint(key: &VerifyingKey) -> String {
    let x = URL_SAFE_NO_PAD.encode(key.as_bytes());
    // Required members only, lexicographic order, no whitespace.
    let canonical = format!(r#"{{"crv":"Ed25519","kty":"OKP","x":"{x}"}}"#);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn key(seed: u8) -> VerifyingKey {
        SigningKey::from_bytes(&[seed; 32]).verifying_key()
    }

    #[test]
    fn rfc8037_thumbprint() {
        // Public key from RFC 8037 appendix A.
        let x = URL_SAFE_NO_PAD
            .decode("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo")
            .unwrap();
        let vk = VerifyingKey::from_bytes(&x.try_into().unwrap()).unwrap();
        assert_eq!(thumbprint(&vk), "kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k");
    }

    #[test]
    fn jwk_conversion_round_trips() {
        let vk = key(7);
        let jwk = jwk_from_verifying_key(&vk, "k");
        assert_eq!(verifying_key_from_jwk(&jwk).unwrap(), vk);
    }

    #[test]
    fn resolver_distinguishes_unknown_and_ambiguous() {
        let unique = Jwks::new(vec![
            jwk_from_verifying_key(&key(1), "a"),
            jwk_from_verifying_key(&key(2), "b"),
        ]);
        assert_eq!(unique.resolve_key("a").unwrap(), key(1));
        assert!(matches!(unique.resolve_key("c"), Err(StatementError::UnknownKey(_))));

        let repeated = Jwks::new(vec![
            jwk_from_verifying_key(&key(1), "a"),
            jwk_from_verifying_key(&key(2), "b"),
            jwk_from_verifying_key(&key(3), "b"),
        ]);
        // A repeated kid poisons the whole set, not only lookups of that kid.
        assert!(matches!(repeated.resolve_key("a"), Err(StatementError::AmbiguousKey(kid)) if kid == "b"));
        assert!(matches!(repeated.resolve_key("b"), Err(StatementError::AmbiguousKey(kid)) if kid == "b"));
    }

    #[test]
    fn key_without_kid_is_rejected() {
        let jwks = Jwks::new(vec![
            jwk_from_verifying_key(&key(1), "a"),
            jwk_from_verifying_key(&key(2), ""),
        ]);
        assert!(matches!(jwks.resolve_key("a"), Err(StatementError::InvalidKey { .. })));
    }

    #[test]
    fn non_ed25519_keys_are_rejected() {
        let mut jwk = jwk_from_verifying_key(&key(1), "a");
        jwk.kty = "EC".to_string();
        assert!(matches!(verifying_key_from_jwk(&jwk), Err(StatementError::InvalidKey { .. })));

        let mut short = jwk_from_verifying_key(&key(1), "a");
        short.x = Some(URL_SAFE_NO_PAD.encode([0u8; 16]));
        assert!(matches!(verifying_key_from_jwk(&short), Err(StatementError::InvalidKey { .. })));
    }
}
