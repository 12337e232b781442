//! Metadata resolution over a trust chain.
//!
//! Re-validates a chain of signed statements from the trust anchor end toward
//! the leaf, merges the metadata policies of the superiors' statements, applies
//! the result to the leaf's metadata, and keeps the leaf's trust marks that the
//! trust anchor recognises.

use crate::error::ResolveError;
use crate::resolver::{TrustAnchor, TrustChainResolver};
use crate::retrieval::{RetrievalError, Retriever};
use crate::transport::RequestContext;
use oidfed_policy::MetadataPolicy;
use oidfed_statement::{
    extract_unverified_claims, verify_claims, verify_entity_statement, verify_self_signed, EntityStatement,
    ResolveResponse, StatementError, TrustMarkClaims, TrustMarkEntry,
};
use oidfed_types::{EntityIdentifier, Metadata, TRUST_MARK_TYP};
use std::collections::BTreeMap;

/// The outcome of resolving a leaf's metadata through a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    /// The leaf's entity configuration.
    pub leaf: EntityStatement,
    /// The leaf's metadata with all policies applied.
    pub metadata: Metadata,
    /// Leaf trust marks the trust anchor recognises.
    pub trust_marks: Vec<TrustMarkEntry>,
    /// The validated chain, leaf configuration first, anchor configuration
    /// last.
    pub trust_chain: Vec<String>,
    /// Earliest expiry of any statement in the chain.
    pub expires_at: i64,
}

impl ResolvedMetadata {
    /// Builds the resolve response `issuer` publishes for this result.
    pub fn into_response(self, issuer: EntityIdentifier, iat: i64) -> ResolveResponse {
        ResolveResponse {
            iss: issuer,
            sub: self.leaf.sub,
            iat,
            exp: self.expires_at,
            metadata: self.metadata,
            trust_marks: self.trust_marks,
            trust_chain: self.trust_chain,
        }
    }
}

/// Resolves metadata over chains, validating every hop.
#[derive(Clone, Copy)]
pub struct MetadataResolver<'a> {
    retriever: Retriever<'a>,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(retriever: Retriever<'a>) -> Self {
        Self { retriever }
    }

    /// Discovers a chain from `leaf` to `anchor` and resolves the leaf's
    /// metadata through it.
    pub fn resolve(
        &self,
        ctx: &RequestContext,
        issuer: &EntityIdentifier,
        leaf: &EntityIdentifier,
        anchor: &TrustAnchor,
    ) -> Result<ResolveResponse, ResolveError> {
        let chain = TrustChainResolver::new(self.retriever).resolve(ctx, leaf, anchor)?;
        let resolved = self.resolve_metadata(ctx, &chain.tokens(), anchor)?;
        Ok(resolved.into_response(issuer.clone(), self.retriever.now()))
    }

    /// Validates `tokens` as a chain ending at `anchor` and resolves the
    /// leaf's metadata.
    ///
    /// `tokens` runs leaf configuration first. If the last token is not the
    /// anchor's configuration, the configuration of its issuer is retrieved
    /// and appended.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidTrustChain`] if any hop fails validation
    /// - [`ResolveError::InvalidMetadata`] if the policies cannot be merged or
    ///   applied
    /// - [`ResolveError::Retrieval`] if a trailing anchor configuration is
    ///   needed and cannot be retrieved
    pub fn resolve_metadata(
        &self,
        ctx: &RequestContext,
        tokens: &[String],
        anchor: &TrustAnchor,
    ) -> Result<ResolvedMetadata, ResolveError> {
        let tokens = self.complete_chain(ctx, tokens)?;
        let now = self.retriever.now();
        let n = tokens.len();
        if n == 2 {
            return Err(ResolveError::InvalidTrustChain(
                "chain has no subordinate statement about the leaf".to_string(),
            ));
        }

        let anchor_config = verify_self_signed(&tokens[n - 1], now).map_err(|e| invalid_hop(n - 1, e))?;
        if !anchor_config.is_entity_configuration() || anchor_config.sub != anchor.entity_id {
            return Err(ResolveError::InvalidTrustChain(format!(
                "chain ends at {}, not at trust anchor {}",
                anchor_config.sub, anchor.entity_id
            )));
        }
        anchor.check_pinned(&tokens[n - 1], now)?;

        // Anchor configuration first, then each statement below it.
        let mut validated = vec![anchor_config];
        for i in (1..n.saturating_sub(1)).rev() {
            let superior = &validated[validated.len() - 1];
            let statement = verify_entity_statement(&tokens[i], &superior.jwks, now).map_err(|e| invalid_hop(i, e))?;
            if statement.is_entity_configuration() {
                return Err(ResolveError::InvalidTrustChain(format!(
                    "entry {i} is an entity configuration, expected a subordinate statement"
                )));
            }
            if statement.iss != superior.sub {
                return Err(ResolveError::InvalidTrustChain(format!(
                    "entry {i} is issued by {}, expected {}",
                    statement.iss, superior.sub
                )));
            }
            validated.push(statement);
        }

        let leaf = if n == 1 {
            validated[0].clone()
        } else {
            self.validate_leaf(&tokens[0], &validated[validated.len() - 1], now)?
        };

        let metadata = leaf.metadata.clone().unwrap_or_default();
        let metadata = if n == 1 {
            metadata
        } else {
            let policies = validated[1..].iter().filter_map(|s| s.metadata_policy.as_ref());
            let merged = MetadataPolicy::merge_all(policies)?;
            merged.apply(&metadata)?
        };

        let expires_at = validated
            .iter()
            .map(|s| s.exp)
            .chain(std::iter::once(leaf.exp))
            .min()
            .unwrap_or(leaf.exp);
        if expires_at <= now {
            return Err(ResolveError::ExpiredChain { exp: expires_at, now });
        }

        let trust_marks = self.filter_trust_marks(ctx, &leaf, &validated[0])?;

        tracing::debug!(leaf = %leaf.sub, anchor = %anchor.entity_id, hops = n, "metadata resolved");
        Ok(ResolvedMetadata {
            leaf,
            metadata,
            trust_marks,
            trust_chain: tokens,
            expires_at,
        })
    }

    /// Appends the anchor configuration when the chain ends in a
    /// subordinate statement.
    fn complete_chain(&self, ctx: &RequestContext, tokens: &[String]) -> Result<Vec<String>, ResolveError> {
        let Some(last) = tokens.last() else {
            return Err(ResolveError::InvalidTrustChain("chain is empty".to_string()));
        };
        let claims = extract_unverified_claims(last).map_err(|e| invalid_hop(tokens.len() - 1, e))?;
        let mut tokens = tokens.to_vec();
        if claims.iss == claims.sub {
            return Ok(tokens);
        }

        let issuer = claims
            .iss
            .as_deref()
            .ok_or_else(|| ResolveError::InvalidTrustChain("last entry has no iss".to_string()))?;
        let issuer = EntityIdentifier::parse(issuer)
            .map_err(|e| ResolveError::InvalidTrustChain(format!("last entry: {e}")))?;
        let config = self.retriever.entity_configuration(ctx, &issuer)?;
        tokens.push(config.token);
        Ok(tokens)
    }

    /// Verifies the leaf configuration against its own keys and against the
    /// keys its immediate superior states for it.
    fn validate_leaf(&self, token: &str, superior: &EntityStatement, now: i64) -> Result<EntityStatement, ResolveError> {
        let leaf = verify_self_signed(token, now).map_err(|e| invalid_hop(0, e))?;
        if !leaf.is_entity_configuration() {
            return Err(ResolveError::InvalidTrustChain(
                "first entry is not an entity configuration".to_string(),
            ));
        }
        if leaf.iss != superior.sub {
            return Err(ResolveError::InvalidTrustChain(format!(
                "leaf {} does not match the subject {} of its superior's statement",
                leaf.iss, superior.sub
            )));
        }
        verify_entity_statement(token, &superior.jwks, now).map_err(|e| {
            ResolveError::InvalidTrustChain(format!(
                "leaf signing key is not bound by its superior's statement: {e}"
            ))
        })?;
        Ok(leaf)
    }

    fn filter_trust_marks(
        &self,
        ctx: &RequestContext,
        leaf: &EntityStatement,
        anchor: &EntityStatement,
    ) -> Result<Vec<TrustMarkEntry>, ResolveError> {
        let Some(issuers) = &anchor.trust_mark_issuers else {
            if !leaf.trust_marks().is_empty() {
                tracing::debug!(anchor = %anchor.sub, "trust anchor recognises no trust marks");
            }
            return Ok(Vec::new());
        };

        let mut kept = Vec::new();
        for entry in leaf.trust_marks() {
            match self.check_trust_mark(ctx, leaf, anchor, issuers, entry) {
                Ok(()) => kept.push(entry.clone()),
                Err(Rejection::Cancelled) => return Err(RetrievalError::Cancelled.into()),
                Err(Rejection::Invalid(reason)) => {
                    tracing::debug!(leaf = %leaf.sub, trust_mark = %entry.id, %reason, "dropping trust mark");
                }
            }
        }
        Ok(kept)
    }

    fn check_trust_mark(
        &self,
        ctx: &RequestContext,
        leaf: &EntityStatement,
        anchor: &EntityStatement,
        issuers: &BTreeMap<String, Vec<EntityIdentifier>>,
        entry: &TrustMarkEntry,
    ) -> Result<(), Rejection> {
        let allowed = issuers
            .get(&entry.id)
            .ok_or_else(|| Rejection::Invalid("not recognised by the trust anchor".to_string()))?;

        let iss = extract_unverified_claims(&entry.trust_mark)?
            .iss
            .ok_or_else(|| Rejection::Invalid("no iss".to_string()))?;
        let iss = EntityIdentifier::parse(&iss).map_err(|e| Rejection::Invalid(e.to_string()))?;
        if !allowed.is_empty() && !allowed.contains(&iss) {
            return Err(Rejection::Invalid(format!("{iss} may not issue this trust mark")));
        }

        let issuer_config = if iss == anchor.sub {
            anchor.clone()
        } else {
            self.retriever.entity_configuration(ctx, &iss)?.statement
        };
        let claims: TrustMarkClaims = verify_claims(
            &entry.trust_mark,
            &issuer_config.jwks,
            TRUST_MARK_TYP,
            self.retriever.now(),
        )?;

        if claims.sub != leaf.sub {
            return Err(Rejection::Invalid(format!("issued to {}", claims.sub)));
        }
        if claims.id != entry.id {
            return Err(Rejection::Invalid(format!("signed id is {}", claims.id)));
        }
        Ok(())
    }
}

fn invalid_hop(position: usize, error: StatementError) -> ResolveError {
    ResolveError::InvalidTrustChain(format!("entry {position}: {error}"))
}

/// Why a trust mark was not kept.
enum Rejection {
    Cancelled,
    Invalid(String),
}

impl From<RetrievalError> for Rejection {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Cancelled => Self::Cancelled,
            other => Self::Invalid(other.to_string()),
        }
    }
}

impl From<StatementError> for Rejection {
    fn from(e: StatementError) -> Self {
        Self::Invalid(e.to_string())
    }
}
