//! Federation node: publishes this entity's configuration, issues statements
//! about its subordinates, and resolves metadata for callers.

pub mod api;
pub mod config;
pub mod signing_key;

use axum::{http::Method, routing::get, Extension, Json, Router};
use config::FederationConfig;
use oidfed_federation::{SubordinateDirectory, Transport};
use oidfed_statement::{EntityStatement, StatementSigner};
use oidfed_types::{Clock, EntityIdentifier, EntityTypeMetadata, Metadata, WELL_KNOWN_PATH};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// This node's entity identifier.
    pub entity_id: EntityIdentifier,
    /// Signs every statement the node publishes.
    pub signer: StatementSigner,
    pub federation: FederationConfig,
    /// Subordinates the fetch and list endpoints answer for.
    pub directory: Arc<SubordinateDirectory>,
    /// Outbound transport used by the resolve endpoint.
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Absolute URL of one of this node's endpoints.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.entity_id.as_str().trim_end_matches('/'))
    }

    /// The node's entity configuration as of now.
    pub fn entity_configuration(&self) -> EntityStatement {
        let iat = self.clock.now();
        let lifetime = i64::try_from(self.federation.statement_lifetime_secs).unwrap_or(i64::MAX);

        let mut federation_entity = EntityTypeMetadata::new();
        federation_entity.insert("federation_fetch_endpoint".into(), Value::String(self.endpoint("/fetch")));
        federation_entity.insert("federation_list_endpoint".into(), Value::String(self.endpoint("/list")));
        federation_entity.insert("federation_resolve_endpoint".into(), Value::String(self.endpoint("/resolve")));
        if let Some(name) = &self.federation.organization_name {
            federation_entity.insert("organization_name".into(), Value::String(name.clone()));
        }

        EntityStatement {
            iss: self.entity_id.clone(),
            sub: self.entity_id.clone(),
            iat,
            exp: iat.saturating_add(lifetime),
            jwks: self.signer.jwks(),
            authority_hints: (!self.federation.authority_hints.is_empty())
                .then(|| self.federation.authority_hints.clone()),
            metadata: Some(Metadata {
                federation_entity: Some(federation_entity),
                ..Metadata::default()
            }),
            metadata_policy: None,
            trust_marks: None,
            trust_mark_issuers: None,
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(WELL_KNOWN_PATH, get(api::entity_configuration_handler))
        .route("/fetch", get(api::fetch_handler))
        .route("/list", get(api::list_handler))
        .route("/resolve", get(api::resolve_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]))
        .layer(Extension(Arc::new(state)))
}
