//! Signature and claim verification.

use crate::codec::{self, EDDSA};
use crate::error::StatementError;
use crate::keys::KeyResolver;
use crate::statement::EntityStatement;
use ed25519_dalek::{Signature, Verifier};
use oidfed_types::{Jwks, ENTITY_STATEMENT_TYP};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Verifies a compact token of type `typ` and deserializes its claims.
///
/// The header must name `EdDSA` and `typ`, the signature must verify under
/// the key `resolver` returns for the header `kid`, and an `exp` claim, if
/// present, must lie after `now`.
///
/// # Errors
///
/// Returns the [`StatementError`] of the first failed check.
pub fn verify_claims<T, R>(token: &str, resolver: &R, typ: &str, now: i64) -> Result<T, StatementError>
where
    T: DeserializeOwned,
    R: KeyResolver + ?Sized,
{
    let parts = codec::split(token)?;

    if parts.header.alg != EDDSA {
        return Err(StatementError::UnsupportedAlgorithm(parts.header.alg));
    }
    if parts.header.typ.as_deref() != Some(typ) {
        return Err(StatementError::UnexpectedType {
            expected: typ.to_string(),
            found: parts.header.typ,
        });
    }
    let kid = parts
        .header
        .kid
        .as_deref()
        .ok_or_else(|| StatementError::Malformed("header has no kid".to_string()))?;

    let key = resolver.resolve_key(kid)?;
    let signature = Signature::from_slice(&parts.signature)
        .map_err(|_| StatementError::InvalidSignature(kid.to_string()))?;
    key.verify(parts.signing_input.as_bytes(), &signature)
        .map_err(|_| StatementError::InvalidSignature(kid.to_string()))?;

    if let Some(exp) = parts.claims.get("exp") {
        let exp = exp
            .as_i64()
            .ok_or_else(|| StatementError::InvalidClaims("exp is not an integer".to_string()))?;
        if exp <= now {
            return Err(StatementError::Expired { exp, now });
        }
    }

    tracing::trace!(kid, typ, "statement signature verified");
    serde_json::from_value(Value::Object(parts.claims))
        .map_err(|e| StatementError::InvalidClaims(e.to_string()))
}

/// Verifies an entity statement against `resolver`.
pub fn verify_entity_statement<R>(token: &str, resolver: &R, now: i64) -> Result<EntityStatement, StatementError>
where
    R: KeyResolver + ?Sized,
{
    verify_claims(token, resolver, ENTITY_STATEMENT_TYP, now)
}

/// Verifies an entity configuration against the key set in its own body.
pub fn verify_self_signed(token: &str, now: i64) -> Result<EntityStatement, StatementError> {
    let parts = codec::split(token)?;
    let jwks = parts
        .claims
        .get("jwks")
        .cloned()
        .ok_or_else(|| StatementError::InvalidClaims("missing jwks".to_string()))?;
    let jwks: Jwks = serde_json::from_value(jwks)
        .map_err(|e| StatementError::InvalidClaims(format!("jwks: {e}")))?;
    verify_entity_statement(token, &jwks, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::StatementSigner;
    use oidfed_types::{EntityIdentifier, RESOLVE_RESPONSE_TYP};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn statement(signer: &StatementSigner, iss: &str, sub: &str, exp: i64) -> EntityStatement {
        EntityStatement {
            iss: EntityIdentifier::parse(iss).unwrap(),
            sub: EntityIdentifier::parse(sub).unwrap(),
            iat: NOW,
            exp,
            jwks: signer.jwks(),
            authority_hints: None,
            metadata: None,
            metadata_policy: None,
            trust_marks: None,
            trust_mark_issuers: None,
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = StatementSigner::generate();
        let original = statement(&signer, "https://a.example.com", "https://a.example.com", NOW + 60);
        let token = signer.sign_entity_statement(&original).unwrap();

        let verified = verify_self_signed(&token, NOW).unwrap();
        assert_eq!(verified, original);
        assert_eq!(verify_entity_statement(&token, &signer.jwks(), NOW).unwrap(), original);
    }

    #[test]
    fn expired_statement_is_rejected() {
        let signer = StatementSigner::generate();
        let token = signer
            .sign_entity_statement(&statement(&signer, "https://a.example.com", "https://a.example.com", NOW))
            .unwrap();
        assert!(matches!(
            verify_self_signed(&token, NOW),
            Err(StatementError::Expired { exp: NOW, now: NOW })
        ));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = StatementSigner::generate();
        let impostor = StatementSigner::generate().with_kid(signer.kid());
        let token = impostor
            .sign_entity_statement(&statement(&impostor, "https://a.example.com", "https://b.example.com", NOW + 60))
            .unwrap();

        assert!(matches!(
            verify_entity_statement(&token, &signer.jwks(), NOW),
            Err(StatementError::InvalidSignature(_))
        ));
        let stranger = StatementSigner::generate();
        assert!(matches!(
            verify_entity_statement(&token, &stranger.jwks(), NOW),
            Err(StatementError::UnknownKey(_))
        ));
    }

    #[test]
    fn duplicate_kid_is_ambiguous() {
        let signer = StatementSigner::generate();
        let mut jwks = signer.jwks();
        jwks.keys.push(StatementSigner::generate().with_kid(signer.kid()).public_jwk());

        let token = signer
            .sign_entity_statement(&statement(&signer, "https://a.example.com", "https://a.example.com", NOW + 60))
            .unwrap();
        assert!(matches!(
            verify_entity_statement(&token, &jwks, NOW),
            Err(StatementError::AmbiguousKey(_))
        ));
    }

    #[test]
    fn repeated_kid_elsewhere_in_set_is_ambiguous() {
        let signer = StatementSigner::generate().with_kid("a");
        let mut jwks = signer.jwks();
        jwks.keys.push(StatementSigner::generate().with_kid("b").public_jwk());
        jwks.keys.push(StatementSigner::generate().with_kid("b").public_jwk());

        let mut body = statement(&signer, "https://a.example.com", "https://a.example.com", NOW + 60);
        body.jwks = jwks.clone();
        let token = signer.sign_entity_statement(&body).unwrap();

        assert!(matches!(
            verify_entity_statement(&token, &jwks, NOW),
            Err(StatementError::AmbiguousKey(kid)) if kid == "b"
        ));
        assert!(matches!(
            verify_self_signed(&token, NOW),
            Err(StatementError::AmbiguousKey(kid)) if kid == "b"
        ));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let signer = StatementSigner::generate();
        let token = signer
            .sign_entity_statement(&statement(&signer, "https://a.example.com", "https://a.example.com", NOW + 60))
            .unwrap();
        let forged = signer
            .sign_entity_statement(&statement(&signer, "https://a.example.com", "https://a.example.com", NOW + 9999))
            .unwrap();

        let mut pieces: Vec<&str> = token.split('.').collect();
        pieces[1] = forged.split('.').nth(1).unwrap();
        let spliced = pieces.join(".");
        assert!(matches!(
            verify_self_signed(&spliced, NOW),
            Err(StatementError::InvalidSignature(_))
        ));
    }

    #[test]
    fn typ_is_enforced() {
        let signer = StatementSigner::generate();
        let token = signer
            .sign(RESOLVE_RESPONSE_TYP, &json!({"iss": "https://a.example.com", "exp": NOW + 60}))
            .unwrap();

        assert!(matches!(
            verify_entity_statement(&token, &signer.jwks(), NOW),
            Err(StatementError::UnexpectedType { .. })
        ));
        let claims: Value = verify_claims(&token, &signer.jwks(), RESOLVE_RESPONSE_TYP, NOW).unwrap();
        assert_eq!(claims["iss"], "https://a.example.com");
    }

    #[test]
    fn missing_claims_are_invalid() {
        let signer = StatementSigner::generate();
        let token = signer
            .sign(ENTITY_STATEMENT_TYP, &json!({"iss": "https://a.example.com", "jwks": signer.jwks(), "exp": NOW + 60}))
            .unwrap();
        assert!(matches!(
            verify_self_signed(&token, NOW),
            Err(StatementError::InvalidClaims(_))
        ));
    }
}
