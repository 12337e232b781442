#![allow(dead_code)]

use oidfed_federation::{HttpResponse, RequestContext, Retriever, Transport, TransportError};
use oidfed_statement::{EntityStatement, StatementSigner};
use oidfed_types::{EntityIdentifier, FixedClock, ENTITY_STATEMENT_MEDIA_TYPE};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

pub const NOW: i64 = 1_700_000_000;
pub const LIFETIME: i64 = 3_600;

pub fn id(value: &str) -> EntityIdentifier {
    EntityIdentifier::parse(value).unwrap()
}

pub fn fetch_url(issuer: &str, subject: &str) -> String {
    Url::parse_with_params(&format!("{issuer}/fetch"), &[("sub", subject)])
        .unwrap()
        .to_string()
}

/// Serves canned responses and records every requested URL.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<String>>,
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

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests().iter().filter(|u| u.contains("/fetch?")).count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl Transport for MockTransport {
    fn get(&self, _ctx: &RequestContext, url: &Url, _accept: &str) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
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

/// An in-memory federation: entities publish configurations and superiors
/// publish statements about their subordinates, all through a
/// [`MockTransport`].
pub struct Federation {
    pub transport: MockTransport,
    pub clock: FixedClock,
    signers: HashMap<String, StatementSigner>,
    configs: HashMap<String, EntityStatement>,
}

impl Federation {
    pub fn new() -> Self {
        Self {
            transport: MockTransport::default(),
            clock: FixedClock::new(NOW),
            signers: HashMap::new(),
            configs: HashMap::new(),
        }
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(&self.transport, &self.clock)
    }

    pub fn signer(&self, entity: &str) -> &StatementSigner {
        &self.signers[entity]
    }

    pub fn config(&self, entity: &str) -> &EntityStatement {
        &self.configs[entity]
    }

    /// Publishes an entity configuration with a fetch endpoint and the
    /// given authority hints. `metadata` is merged into the published
    /// metadata.
    pub fn add_entity(&mut self, entity: &str, hints: &[&str], metadata: Value) -> &mut Self {
        let mut published = json!({
            "federation_entity": { "federation_fetch_endpoint": format!("{entity}/fetch") }
        });
        if let Value::Object(extra) = metadata {
            for (k, v) in extra {
                published[k] = v;
            }
        }

        let signer = StatementSigner::generate();
        let statement = EntityStatement {
            iss: id(entity),
            sub: id(entity),
            iat: NOW,
            exp: NOW + LIFETIME,
            jwks: signer.jwks(),
            authority_hints: (!hints.is_empty()).then(|| hints.iter().map(|h| id(h)).collect()),
            metadata: Some(serde_json::from_value(published).unwrap()),
            metadata_policy: None,
            trust_marks: None,
            trust_mark_issuers: None,
        };
        self.signers.insert(entity.to_string(), signer);
        self.publish_config(statement);
        self
    }

    /// Changes and republishes an entity configuration.
    pub fn update_entity(&mut self, entity: &str, change: impl FnOnce(&mut EntityStatement)) -> &mut Self {
        let mut statement = self.configs[entity].clone();
        change(&mut statement);
        self.publish_config(statement);
        self
    }

    fn publish_config(&mut self, statement: EntityStatement) {
        let entity = statement.sub.to_string();
        let token = self.signers[&entity].sign_entity_statement(&statement).unwrap();
        self.transport.serve(statement.sub.well_known_url().to_string(), token);
        self.configs.insert(entity, statement);
    }

    /// Publishes `issuer`'s statement about `subject`, with an optional
    /// metadata policy.
    pub fn add_subordinate(&mut self, issuer: &str, subject: &str, policy: Option<Value>) -> &mut Self {
        self.add_subordinate_with(issuer, subject, |s| {
            s.metadata_policy = policy.map(|p| serde_json::from_value(p).unwrap());
        })
    }

    pub fn add_subordinate_with(
        &mut self,
        issuer: &str,
        subject: &str,
        change: impl FnOnce(&mut EntityStatement),
    ) -> &mut Self {
        let mut statement = EntityStatement {
            iss: id(issuer),
            sub: id(subject),
            iat: NOW,
            exp: NOW + LIFETIME,
            jwks: self.configs[subject].jwks.clone(),
            authority_hints: None,
            metadata: None,
            metadata_policy: None,
            trust_marks: None,
            trust_mark_issuers: None,
        };
        change(&mut statement);
        let token = self.signers[issuer].sign_entity_statement(&statement).unwrap();
        self.transport.serve(fetch_url(issuer, subject), token);
        self
    }

    /// Signs a trust mark about `subject` as `issuer`.
    pub fn trust_mark(&self, issuer: &str, subject: &str, mark_id: &str) -> String {
        self.signers[issuer]
            .sign(
                oidfed_types::TRUST_MARK_TYP,
                &json!({
                    "iss": issuer,
                    "sub": subject,
                    "id": mark_id,
                    "iat": NOW,
                    "exp": NOW + LIFETIME,
                }),
            )
            .unwrap()
    }
}

/// leaf -> anchor.
pub fn direct_federation() -> Federation {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity(
            "https://rp.example.com",
            &["https://ta.example.com"],
            json!({ "openid_relying_party": { "client_name": "RP" } }),
        )
        .add_subordinate("https://ta.example.com", "https://rp.example.com", None);
    fed
}

/// leaf -> ia1 -> ia2 -> anchor.
pub fn deep_federation() -> Federation {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity("https://ia2.example.com", &["https://ta.example.com"], json!({}))
        .add_entity("https://ia1.example.com", &["https://ia2.example.com"], json!({}))
        .add_entity(
            "https://rp.example.com",
            &["https://ia1.example.com"],
            json!({ "openid_relying_party": { "client_name": "RP" } }),
        )
        .add_subordinate("https://ta.example.com", "https://ia2.example.com", None)
        .add_subordinate("https://ia2.example.com", "https://ia1.example.com", None)
        .add_subordinate("https://ia1.example.com", "https://rp.example.com", None);
    fed
}
