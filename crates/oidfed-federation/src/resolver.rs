//! Trust chain discovery.
//!
//! Starting from a leaf, the resolver walks authority hints depth-first until
//! it reaches the requested trust anchor, backtracking out of branches that
//! cannot be retrieved or that dead-end. Every entity is visited at most once,
//! so the search terminates on any hint graph, cyclic or not.

use crate::error::ResolveError;
use crate::retrieval::{RetrievalError, Retriever, SignedStatement};
use crate::transport::RequestContext;
use oidfed_statement::{verify_entity_statement, EntityStatement};
use oidfed_types::{EntityIdentifier, Jwks};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A trust anchor accepted by the caller, optionally with pinned keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAnchor {
    pub entity_id: EntityIdentifier,
    /// When set, the anchor's configuration must verify against these keys
    /// as well as its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<Jwks>,
}

impl TrustAnchor {
    pub fn new(entity_id: EntityIdentifier) -> Self {
        Self { entity_id, jwks: None }
    }

    pub fn with_jwks(mut self, jwks: Jwks) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Checks an anchor configuration against the pinned keys, if any.
    pub(crate) fn check_pinned(&self, token: &str, now: i64) -> Result<(), ResolveError> {
        let Some(pinned) = &self.jwks else {
            return Ok(());
        };
        verify_entity_statement(token, pinned, now).map_err(|e| {
            ResolveError::InvalidTrustChain(format!(
                "configuration of {} does not verify against pinned keys: {e}",
                self.entity_id
            ))
        })?;
        Ok(())
    }
}

/// A validated chain of statements from a leaf to a trust anchor.
///
/// Entries run leaf configuration first, then each superior's statement about
/// the entity below it, then the anchor's configuration. Adjacent entries
/// satisfy `entries[i].iss == entries[i + 1].sub`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustChain {
    entries: Vec<SignedStatement>,
}

impl TrustChain {
    pub(crate) fn new(entries: Vec<SignedStatement>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statements(&self) -> impl Iterator<Item = &EntityStatement> {
        self.entries.iter().map(|e| &e.statement)
    }

    /// Signed tokens, leaf configuration first.
    pub fn tokens(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.token.clone()).collect()
    }

    pub fn leaf(&self) -> Option<&EntityStatement> {
        self.entries.first().map(|e| &e.statement)
    }

    pub fn trust_anchor(&self) -> Option<&EntityStatement> {
        self.entries.last().map(|e| &e.statement)
    }

    /// Earliest `exp` of any entry.
    pub fn expires_at(&self) -> Option<i64> {
        self.statements().map(|s| s.exp).min()
    }

    /// Rejects the chain if any entry has expired at `now`.
    pub fn ensure_unexpired(&self, now: i64) -> Result<(), ResolveError> {
        match self.expires_at() {
            Some(exp) if exp <= now => Err(ResolveError::ExpiredChain { exp, now }),
            _ => Ok(()),
        }
    }
}

/// Depth-first trust chain search.
#[derive(Clone, Copy)]
pub struct TrustChainResolver<'a> {
    retriever: Retriever<'a>,
}

impl<'a> TrustChainResolver<'a> {
    pub fn new(retriever: Retriever<'a>) -> Self {
        Self { retriever }
    }

    /// Finds and validates a trust chain from `leaf` to `anchor`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidRequest`] if `leaf` is the anchor, before any
    ///   retrieval
    /// - [`ResolveError::Retrieval`] if the leaf's own configuration cannot
    ///   be retrieved, a subordinate statement on the found path cannot be
    ///   retrieved, or the context is cancelled
    /// - [`ResolveError::UnreachableTrustAnchor`] if no path reaches the anchor
    /// - [`ResolveError::ExpiredChain`] if the found chain has expired
    pub fn resolve(
        &self,
        ctx: &RequestContext,
        leaf: &EntityIdentifier,
        anchor: &TrustAnchor,
    ) -> Result<TrustChain, ResolveError> {
        if leaf == &anchor.entity_id {
            return Err(ResolveError::InvalidRequest(format!(
                "{leaf} is the trust anchor itself"
            )));
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if !self.step(ctx, leaf, anchor, &mut visited, &mut path)? {
            tracing::info!(leaf = %leaf, anchor = %anchor.entity_id, visited = visited.len(), "trust anchor unreachable");
            return Err(ResolveError::UnreachableTrustAnchor {
                leaf: leaf.clone(),
                anchor: anchor.entity_id.clone(),
            });
        }

        let chain = self.interleave(ctx, path)?;
        chain.ensure_unexpired(self.retriever.now())?;

        tracing::info!(leaf = %leaf, anchor = %anchor.entity_id, length = chain.len(), "trust chain resolved");
        Ok(chain)
    }

    /// Retrieves `subject`'s configuration and searches onward from it.
    ///
    /// Returns `Ok(false)` when this branch cannot reach the anchor; `path`
    /// is then as it was on entry.
    fn step(
        &self,
        ctx: &RequestContext,
        subject: &EntityIdentifier,
        anchor: &TrustAnchor,
        visited: &mut HashSet<EntityIdentifier>,
        path: &mut Vec<SignedStatement>,
    ) -> Result<bool, ResolveError> {
        let config = match self.retriever.entity_configuration(ctx, subject) {
            Ok(config) => config,
            Err(RetrievalError::Cancelled) => return Err(RetrievalError::Cancelled.into()),
            Err(e) if path.is_empty() => return Err(e.into()),
            Err(e) => {
                tracing::debug!(entity_id = %subject, error = %e, "dropping candidate");
                visited.insert(subject.clone());
                return Ok(false);
            }
        };

        visited.insert(subject.clone());
        if config.statement.iss == anchor.entity_id {
            anchor.check_pinned(&config.token, self.retriever.now())?;
            path.push(config);
            return Ok(true);
        }

        let hints: Vec<EntityIdentifier> = config
            .statement
            .authority_hints()
            .iter()
            .filter(|hint| !visited.contains(*hint))
            .cloned()
            .collect();
        let candidates = if hints.contains(&anchor.entity_id) {
            vec![anchor.entity_id.clone()]
        } else {
            hints
        };

        path.push(config);
        for candidate in &candidates {
            // A sibling branch may have visited it since the list was built.
            if visited.contains(candidate) {
                continue;
            }
            tracing::debug!(entity_id = %subject, hint = %candidate, "following authority hint");
            if self.step(ctx, candidate, anchor, visited, path)? {
                return Ok(true);
            }
        }
        path.pop();
        Ok(false)
    }

    /// Turns a path of entity configurations into a chain by inserting each
    /// superior's statement about the entity below it.
    fn interleave(&self, ctx: &RequestContext, path: Vec<SignedStatement>) -> Result<TrustChain, ResolveError> {
        let mut subordinates = Vec::with_capacity(path.len().saturating_sub(1));
        for pair in path.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            subordinates.push(
                self.retriever
                    .subordinate_statement(ctx, &parent.statement, &child.statement.sub)?,
            );
        }

        let mut configs = path.into_iter();
        let mut entries = Vec::with_capacity(subordinates.len() + 2);
        entries.extend(configs.next());
        entries.extend(subordinates);
        entries.extend(configs.last());
        Ok(TrustChain::new(entries))
    }
}
