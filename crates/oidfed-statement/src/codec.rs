//! The compact three-part statement format.
//!
//! A token is `base64url(header) "." base64url(body) "." base64url(signature)`,
//! all segments without padding. Header and body are JSON objects.

use crate::error::StatementError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only supported signature algorithm.
pub const EDDSA: &str = "EdDSA";

/// Protected header of a compact statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A token split into its decoded segments.
#[derive(Debug, Clone)]
pub struct CompactParts<'a> {
    pub header: Header,
    pub claims: Map<String, Value>,
    pub signature: Vec<u8>,
    /// `header "." body` exactly as it appeared in the token.
    pub signing_input: &'a str,
}

/// Claims readable without verifying the signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnverifiedClaims {
    pub kid: Option<String>,
    pub iss: Option<String>,
    pub sub: Option<String>,
}

/// Splits and decodes a compact token without checking its signature.
///
/// # Errors
///
/// Returns [`StatementError::Malformed`] unless the token has exactly three
/// base64url segments whose first two decode to JSON objects and the header
/// carries an `alg`.
pub fn split(token: &str) -> Result<CompactParts<'_>, StatementError> {
    let mut segments = token.split('.');
    let (Some(header_b64), Some(body_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(StatementError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let header_object = decode_object(header_b64, "header")?;
    let header: Header = serde_json::from_value(Value::Object(header_object))
        .map_err(|e| StatementError::Malformed(format!("header: {e}")))?;
    let claims = decode_object(body_b64, "body")?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| StatementError::Malformed(format!("signature: {e}")))?;

    let signing_input = &token[..header_b64.len() + 1 + body_b64.len()];
    Ok(CompactParts {
        header,
        claims,
        signature,
        signing_input,
    })
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>, StatementError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| StatementError::Malformed(format!("{what}: {e}")))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StatementError::Malformed(format!("{what} is not a JSON object"))),
        Err(e) => Err(StatementError::Malformed(format!("{what}: {e}"))),
    }
}

/// Reads `kid`, `iss` and `sub` from a token without checking its signature.
pub fn extract_unverified_claims(token: &str) -> Result<UnverifiedClaims, StatementError> {
    let parts = split(token)?;
    let string_claim = |name: &str| parts.claims.get(name).and_then(Value::as_str).map(str::to_string);
    Ok(UnverifiedClaims {
        kid: parts.header.kid.clone(),
        iss: string_claim("iss"),
        sub: string_claim("sub"),
    })
}

/// Assembles a compact token from a header, a body, and a signing function.
pub(crate) fn encode<F>(header: &Header, claims: &Value, sign: F) -> Result<String, StatementError>
where
    F: FnOnce(&[u8]) -> Vec<u8>,
{
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let body_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{body_b64}");
    let signature_b64 = URL_SAFE_NO_PAD.encode(sign(signing_input.as_bytes()));
    Ok(format!("{signing_input}.{signature_b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn b64(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn split_decodes_all_segments() {
        let header = json!({"alg": "EdDSA", "kid": "k1", "typ": "entity-statement+jwt"});
        let body = json!({"iss": "https://a.example", "sub": "https://b.example"});
        let token = format!("{}.{}.{}", b64(&header), b64(&body), URL_SAFE_NO_PAD.encode([1u8, 2, 3]));

        let parts = split(&token).unwrap();
        assert_eq!(parts.header.kid.as_deref(), Some("k1"));
        assert_eq!(parts.claims["sub"], "https://b.example");
        assert_eq!(parts.signature, vec![1, 2, 3]);
        assert_eq!(parts.signing_input, format!("{}.{}", b64(&header), b64(&body)));

        let unverified = extract_unverified_claims(&token).unwrap();
        assert_eq!(unverified.iss.as_deref(), Some("https://a.example"));
        assert_eq!(unverified.sub.as_deref(), Some("https://b.example"));
    }

    #[test]
    fn split_rejects_malformed_tokens() {
        let header = b64(&json!({"alg": "EdDSA"}));
        let body = b64(&json!({}));

        for token in [
            String::new(),
            format!("{header}.{body}"),
            format!("{header}.{body}.sig.extra"),
            format!("{header}.{}.sig", b64(&json!([1, 2]))),
            format!("{}.{body}.sig", b64(&json!({"kid": "no-alg"}))),
            format!("{header}.not*base64.sig"),
            format!("{header}.{body}.a=="),
        ] {
            let err = split(&token).unwrap_err();
            assert!(err.is_malformed(), "{token:?} gave {err}");
        }
    }
}
