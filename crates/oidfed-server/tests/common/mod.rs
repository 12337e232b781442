#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use oidfed_db::{open_pool, upsert_subordinate, DbPool, PoolSettings, SqliteSubordinateSource, StoreLocation};
use oidfed_federation::{
    HttpResponse, RequestContext, SubordinateDirectory, SubordinateRecord, Transport, TransportError,
};
use oidfed_server::{app, config::FederationConfig, AppState};
use oidfed_statement::{EntityStatement, StatementSigner};
use oidfed_types::{EntityIdentifier, FixedClock, ENTITY_STATEMENT_MEDIA_TYPE};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

pub const NOW: i64 = 1_700_000_000;
pub const NODE: &str = "https://node.example.com";
pub const TA: &str = "https://ta.example.com";
pub const RP: &str = "https://rp.example.com";

pub fn id(value: &str) -> EntityIdentifier {
    EntityIdentifier::parse(value).expect("should parse entity id")
}

/// Serves canned responses; anything else is a 404.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
}

impl MockTransport {
    pub fn serve(&self, url: impl Into<String>, token: String) {
        self.responses.lock().unwrap().insert(
            url.into(),
            HttpResponse {
                status: 200,
                content_type: Some(ENTITY_STATEMENT_MEDIA_TYPE.to_string()),
                body: token,
            },
        );
    }

    pub fn serve_status(&self, url: impl Into<String>, status: u16) {
        self.responses.lock().unwrap().insert(
            url.into(),
            HttpResponse {
                status,
                content_type: None,
                body: String::new(),
            },
        );
    }
}

impl Transport for MockTransport {
    fn get(&self, _ctx: &RequestContext, url: &Url, _accept: &str) -> Result<HttpResponse, TransportError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                content_type: None,
                body: String::new(),
            }))
    }
}

/// A node under test, backed by an on-disk database and a mock transport.
pub struct TestNode {
    pub app: Router,
    pub signer: StatementSigner,
    pub pool: DbPool,
    pub transport: Arc<MockTransport>,
    _dir: tempfile::TempDir,
}

impl TestNode {
    pub fn new(federation: FederationConfig) -> Self {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let location = StoreLocation::File(dir.path().join("oidfed.db"));
        let pool = open_pool(&location, PoolSettings::default()).expect("store should open");

        let clock = Arc::new(FixedClock::new(NOW));
        let transport = Arc::new(MockTransport::default());
        let signer = StatementSigner::generate();
        let directory = SubordinateDirectory::new(
            Arc::new(SqliteSubordinateSource::new(pool.clone())),
            clock.clone(),
            Duration::from_secs(300),
        );

        let state = AppState {
            entity_id: federation.entity_id().expect("entity id should be valid"),
            signer: signer.clone(),
            federation,
            directory: Arc::new(directory),
            transport: transport.clone(),
            clock,
        };

        Self {
            app: app(state),
            signer,
            pool,
            transport,
            _dir: dir,
        }
    }

    /// Registers `entity` as a subordinate with the given keys and policy.
    pub fn register(&self, entity: &str, signer: &StatementSigner, policy: Option<Value>) {
        let conn = self.pool.get().expect("should get a connection");
        let record = SubordinateRecord {
            entity_id: id(entity),
            jwks: signer.jwks(),
            metadata_policy: policy.map(|p| serde_json::from_value(p).expect("should parse policy")),
            metadata: None,
            registered_at: NOW,
        };
        upsert_subordinate(&conn, &record).expect("upsert should succeed");
    }

    /// Sends `GET uri` and returns status, content type and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, content_type, body)
    }

    /// Sends `GET uri` and decodes the error object of a failed request.
    pub async fn get_error(&self, uri: &str) -> (StatusCode, String) {
        let (status, _, body) = self.get(uri).await;
        let error: Value = serde_json::from_slice(&body).expect("error body should be JSON");
        assert!(error["error_description"].is_string(), "error should carry a description");
        (status, error["error"].as_str().expect("error code").to_string())
    }
}

pub fn node_config() -> FederationConfig {
    FederationConfig {
        entity_id: NODE.to_string(),
        authority_hints: vec![id(TA)],
        organization_name: Some("Example Node".to_string()),
        trust_anchors: vec![oidfed_federation::TrustAnchor::new(id(TA))],
        ..FederationConfig::default()
    }
}

pub fn statement(iss: &str, sub: &str, jwks: &StatementSigner) -> EntityStatement {
    EntityStatement {
        iss: id(iss),
        sub: id(sub),
        iat: NOW,
        exp: NOW + 3_600,
        jwks: jwks.jwks(),
        authority_hints: None,
        metadata: None,
        metadata_policy: None,
        trust_marks: None,
        trust_mark_issuers: None,
    }
}

/// The anchor's default policy for the relying party.
pub fn grant_types_policy() -> Value {
    json!({
        "openid_relying_party": {
            "grant_types": { "subset_of": ["authorization_code", "refresh_token"] }
        }
    })
}

/// Publishes rp -> ta through `transport`, the anchor imposing `policy` on
/// the relying party.
pub fn publish_remote_federation(transport: &MockTransport, policy: Value) -> (StatementSigner, StatementSigner) {
    let ta = StatementSigner::generate();
    let rp = StatementSigner::generate();

    let mut ta_config = statement(TA, TA, &ta);
    ta_config.metadata = Some(
        serde_json::from_value(json!({
            "federation_entity": { "federation_fetch_endpoint": format!("{TA}/fetch") }
        }))
        .unwrap(),
    );
    transport.serve(
        id(TA).well_known_url().to_string(),
        ta.sign_entity_statement(&ta_config).unwrap(),
    );

    let mut rp_config = statement(RP, RP, &rp);
    rp_config.authority_hints = Some(vec![id(TA)]);
    rp_config.metadata = Some(
        serde_json::from_value(json!({
            "openid_relying_party": {
                "client_name": "RP",
                "grant_types": ["authorization_code", "implicit"]
            }
        }))
        .unwrap(),
    );
    transport.serve(
        id(RP).well_known_url().to_string(),
        rp.sign_entity_statement(&rp_config).unwrap(),
    );

    let mut about_rp = statement(TA, RP, &rp);
    about_rp.metadata_policy = Some(serde_json::from_value(policy).unwrap());
    let fetch = Url::parse_with_params(&format!("{TA}/fetch"), &[("sub", RP)]).unwrap();
    transport.serve(fetch.to_string(), ta.sign_entity_statement(&about_rp).unwrap());

    (ta, rp)
}
