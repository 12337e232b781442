//! Retrieval and validation of entity configurations and subordinate
//! statements.

use crate::transport::{HttpResponse, RequestContext, Transport, TransportError};
use oidfed_statement::{verify_entity_statement, verify_self_signed, EntityStatement};
use oidfed_types::{Clock, EntityIdentifier, ENTITY_STATEMENT_MEDIA_TYPE};
use url::Url;

/// Errors that can occur while retrieving a statement.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The remote answered with a client error.
    #[error("statement not found at {url} (status {status})")]
    NotFound { url: String, status: u16 },

    /// A statement was retrieved but failed validation.
    #[error("invalid statement from {url}: {reason}")]
    InvalidStatement { url: String, reason: String },

    /// The remote could not be reached or answered with a server error.
    #[error("{url} is temporarily unavailable: {reason}")]
    TemporarilyUnavailable { url: String, reason: String },

    /// The request context's deadline passed.
    #[error("retrieval cancelled: deadline exceeded")]
    Cancelled,
}

impl RetrievalError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    fn invalid(url: &Url, reason: impl ToString) -> Self {
        Self::InvalidStatement {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A validated statement together with the token it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedStatement {
    pub token: String,
    pub statement: EntityStatement,
}

/// The statement validation pipeline.
///
/// Borrows its collaborators, so it is cheap to copy into each resolver.
#[derive(Clone, Copy)]
pub struct Retriever<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
}

impl<'a> Retriever<'a> {
    pub fn new(transport: &'a dyn Transport, clock: &'a dyn Clock) -> Self {
        Self { transport, clock }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Retrieves and validates the entity configuration of `id`.
    ///
    /// The statement must verify against its own key set and be issued by
    /// and about `id`.
    pub fn entity_configuration(
        &self,
        ctx: &RequestContext,
        id: &EntityIdentifier,
    ) -> Result<SignedStatement, RetrievalError> {
        let url = id.well_known_url();
        let token = self.fetch(ctx, &url)?;
        let statement = verify_self_signed(&token, self.now()).map_err(|e| RetrievalError::invalid(&url, e))?;

        if &statement.iss != id || &statement.sub != id {
            return Err(RetrievalError::invalid(
                &url,
                format!(
                    "entity configuration of {id} has iss {} and sub {}",
                    statement.iss, statement.sub
                ),
            ));
        }

        tracing::debug!(entity_id = %id, "retrieved entity configuration");
        Ok(SignedStatement { token, statement })
    }

    /// Retrieves the statement `issuer` makes about `subject` from the
    /// issuer's fetch endpoint, verified against the issuer's key set.
    pub fn subordinate_statement(
        &self,
        ctx: &RequestContext,
        issuer: &EntityStatement,
        subject: &EntityIdentifier,
    ) -> Result<SignedStatement, RetrievalError> {
        let issuer_url = issuer.sub.well_known_url();
        if !issuer.is_entity_configuration() {
            return Err(RetrievalError::invalid(
                &issuer_url,
                format!("statement about {} is not self-issued", issuer.sub),
            ));
        }
        let endpoint = issuer.fetch_endpoint().ok_or_else(|| {
            RetrievalError::invalid(&issuer_url, format!("{} publishes no fetch endpoint", issuer.sub))
        })?;
        let mut url = Url::parse(endpoint)
            .map_err(|e| RetrievalError::invalid(&issuer_url, format!("fetch endpoint {endpoint}: {e}")))?;
        url.query_pairs_mut().append_pair("sub", subject.as_str());

        let token = self.fetch(ctx, &url)?;
        let statement = verify_entity_statement(&token, &issuer.jwks, self.now()).map_err(|e| RetrievalError::invalid(&url, e))?;

        if statement.iss != issuer.sub {
            return Err(RetrievalError::invalid(
                &url,
                format!("expected iss {}, found {}", issuer.sub, statement.iss),
            ));
        }
        if &statement.sub != subject {
            return Err(RetrievalError::invalid(
                &url,
                format!("expected sub {subject}, found {}", statement.sub),
            ));
        }

        tracing::debug!(issuer = %issuer.sub, subject = %subject, "retrieved subordinate statement");
        Ok(SignedStatement { token, statement })
    }

    fn fetch(&self, ctx: &RequestContext, url: &Url) -> Result<String, RetrievalError> {
        if ctx.is_expired() {
            return Err(RetrievalError::Cancelled);
        }

        let response = self
            .transport
            .get(ctx, url, ENTITY_STATEMENT_MEDIA_TYPE)
            .map_err(|e| match e {
                TransportError::Cancelled => RetrievalError::Cancelled,
                TransportError::Request { reason, .. } => RetrievalError::TemporarilyUnavailable {
                    url: url.to_string(),
                    reason,
                },
            })?;

        check_response(url, response)
    }
}

fn check_response(url: &Url, response: HttpResponse) -> Result<String, RetrievalError> {
    match response.status {
        200 => {}
        status @ 400..=499 => {
            return Err(RetrievalError::NotFound {
                url: url.to_string(),
                status,
            })
        }
        status @ 500..=599 => {
            return Err(RetrievalError::TemporarilyUnavailable {
                url: url.to_string(),
                reason: format!("status {status}"),
            })
        }
        status => return Err(RetrievalError::invalid(url, format!("unexpected status {status}"))),
    }

    let media_type = response
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(str::trim);
    match media_type {
        Some(mt) if mt.eq_ignore_ascii_case(ENTITY_STATEMENT_MEDIA_TYPE) => Ok(response.body.trim().to_string()),
        other => Err(RetrievalError::invalid(
            url,
            format!("unexpected content type {other:?}"),
        )),
    }
}
