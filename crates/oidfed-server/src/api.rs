//! HTTP handlers of the federation node.
//!
//! Signed endpoints answer with the compact token as the body and its media
//! type as `Content-Type`. Failures answer with an OpenID Federation error
//! object, `{"error": ..., "error_description": ...}`.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use oidfed_federation::{
    DirectoryError, MetadataResolver, RequestContext, ResolveError, RetrievalError, Retriever,
};
use oidfed_statement::StatementError;
use oidfed_types::{
    EntityIdentifier, ENTITY_STATEMENT_MEDIA_TYPE, RESOLVE_RESPONSE_MEDIA_TYPE, RESOLVE_RESPONSE_TYP,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes and federation error codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidTrustAnchor(String),
    #[error("{0}")]
    InvalidTrustChain(String),
    #[error("{0}")]
    InvalidMetadata(String),
    #[error("{0}")]
    TemporarilyUnavailable(String),
    #[error("{0}")]
    ServerError(String),
}

impl ApiError {
    /// The federation error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidTrustAnchor(_) => "invalid_trust_anchor",
            ApiError::InvalidTrustChain(_) => "invalid_trust_chain",
            ApiError::InvalidMetadata(_) => "invalid_metadata",
            ApiError::TemporarilyUnavailable(_) => "temporarily_unavailable",
            ApiError::ServerError(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidTrustChain(_) | ApiError::InvalidMetadata(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) | ApiError::InvalidTrustAnchor(_) => StatusCode::NOT_FOUND,
            ApiError::TemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), "request failed: {}", self);
        }

        let body = Json(serde_json::json!({
            "error": self.code(),
            "error_description": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match &e {
            ResolveError::InvalidRequest(msg) => ApiError::InvalidRequest(msg.clone()),
            ResolveError::InvalidMetadata(_) => ApiError::InvalidMetadata(e.to_string()),
            ResolveError::Retrieval(RetrievalError::NotFound { .. }) => ApiError::NotFound(e.to_string()),
            ResolveError::Retrieval(RetrievalError::TemporarilyUnavailable { .. } | RetrievalError::Cancelled) => {
                ApiError::TemporarilyUnavailable(e.to_string())
            }
            ResolveError::Retrieval(RetrievalError::InvalidStatement { .. })
            | ResolveError::UnreachableTrustAnchor { .. }
            | ResolveError::ExpiredChain { .. }
            | ResolveError::InvalidTrustChain(_) => ApiError::InvalidTrustChain(e.to_string()),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match &e {
            DirectoryError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DirectoryError::Source(_) | DirectoryError::LockPoisoned => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<StatementError> for ApiError {
    fn from(e: StatementError) -> Self {
        ApiError::ServerError(format!("failed to sign statement: {e}"))
    }
}

/// A compact signed token served with its media type.
#[derive(Debug)]
pub struct SignedToken {
    media_type: &'static str,
    token: String,
}

impl SignedToken {
    pub fn entity_statement(token: String) -> Self {
        Self {
            media_type: ENTITY_STATEMENT_MEDIA_TYPE,
            token,
        }
    }

    pub fn resolve_response(token: String) -> Self {
        Self {
            media_type: RESOLVE_RESPONSE_MEDIA_TYPE,
            token,
        }
    }
}

impl IntoResponse for SignedToken {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.media_type)], self.token).into_response()
    }
}

fn parse_param(name: &str, value: Option<String>) -> Result<EntityIdentifier, ApiError> {
    let value = value.ok_or_else(|| ApiError::InvalidRequest(format!("missing required parameter '{name}'")))?;
    EntityIdentifier::parse(&value).map_err(|e| ApiError::InvalidRequest(format!("parameter '{name}': {e}")))
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::ServerError(format!("task join error: {e}")))?
}

/// Handler for `GET /.well-known/openid-federation`.
pub async fn entity_configuration_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<SignedToken, ApiError> {
    let statement = state.entity_configuration();
    Ok(SignedToken::entity_statement(
        state.signer.sign_entity_statement(&statement)?,
    ))
}

/// Query parameters of the fetch endpoint.
#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub sub: Option<String>,
}

/// Handler for `GET /fetch?sub=`.
pub async fn fetch_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<FetchParams>,
) -> Result<SignedToken, ApiError> {
    let sub = parse_param("sub", params.sub)?;
    if sub == state.entity_id {
        return Err(ApiError::InvalidRequest(
            "'sub' names the issuer; fetch its entity configuration instead".to_string(),
        ));
    }

    let token = run_blocking(move || {
        let record = state.directory.get(&sub)?;
        let statement = record.to_statement(
            &state.entity_id,
            state.clock.now(),
            state.federation.statement_lifetime(),
        );
        tracing::debug!(sub = %sub, "issuing subordinate statement");
        Ok(state.signer.sign_entity_statement(&statement)?)
    })
    .await?;

    Ok(SignedToken::entity_statement(token))
}

/// Handler for `GET /list`.
pub async fn list_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<EntityIdentifier>>, ApiError> {
    let subordinates = run_blocking(move || Ok(state.directory.list()?)).await?;
    Ok(Json(subordinates))
}

/// Query parameters of the resolve endpoint.
#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub sub: Option<String>,
    pub trust_anchor: Option<String>,
}

/// Handler for `GET /resolve?sub=&trust_anchor=`.
///
/// Resolution runs on a blocking thread, bounded by the configured resolve
/// timeout.
pub async fn resolve_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> Result<SignedToken, ApiError> {
    let sub = parse_param("sub", params.sub)?;
    let anchor_id = parse_param("trust_anchor", params.trust_anchor)?;
    let anchor = state
        .federation
        .trust_anchor(&anchor_id)
        .cloned()
        .ok_or_else(|| ApiError::InvalidTrustAnchor(format!("{anchor_id} is not a configured trust anchor")))?;

    let token = run_blocking(move || {
        let ctx = RequestContext::with_timeout(state.federation.resolve_timeout());
        let retriever = Retriever::new(state.transport.as_ref(), state.clock.as_ref());
        let response = MetadataResolver::new(retriever)
            .resolve(&ctx, &state.entity_id, &sub, &anchor)
            .inspect_err(|e| tracing::info!(sub = %sub, trust_anchor = %anchor.entity_id, "resolve failed: {e}"))?;

        tracing::info!(
            sub = %sub,
            trust_anchor = %anchor.entity_id,
            chain_length = response.trust_chain.len(),
            "resolved metadata"
        );
        Ok(state.signer.sign(RESOLVE_RESPONSE_TYP, &response)?)
    })
    .await?;

    Ok(SignedToken::resolve_response(token))
}
