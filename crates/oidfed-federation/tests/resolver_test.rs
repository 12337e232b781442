mod common;

use common::*;
use oidfed_federation::{RequestContext, ResolveError, RetrievalError, TrustAnchor, TrustChainResolver};
use oidfed_statement::StatementSigner;
use serde_json::json;
use std::time::{Duration, Instant};

fn anchor() -> TrustAnchor {
    TrustAnchor::new(id("https://ta.example.com"))
}

fn subjects(chain: &oidfed_federation::TrustChain) -> Vec<(String, String)> {
    chain
        .statements()
        .map(|s| (s.iss.to_string(), s.sub.to_string()))
        .collect()
}

#[test]
fn direct_subordinate_of_anchor() {
    let fed = direct_federation();
    let chain = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap();

    assert_eq!(chain.len(), 3);
    assert_eq!(
        subjects(&chain),
        vec![
            ("https://rp.example.com".to_string(), "https://rp.example.com".to_string()),
            ("https://ta.example.com".to_string(), "https://rp.example.com".to_string()),
            ("https://ta.example.com".to_string(), "https://ta.example.com".to_string()),
        ]
    );
    assert_eq!(fed.transport.fetch_count(), 1);
    assert_eq!(chain.expires_at(), Some(NOW + LIFETIME));
}

#[test]
fn four_node_path_yields_five_entries() {
    let fed = deep_federation();
    let chain = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap();

    assert_eq!(chain.len(), 5);
    assert_eq!(
        subjects(&chain),
        vec![
            ("https://rp.example.com".to_string(), "https://rp.example.com".to_string()),
            ("https://ia1.example.com".to_string(), "https://rp.example.com".to_string()),
            ("https://ia2.example.com".to_string(), "https://ia1.example.com".to_string()),
            ("https://ta.example.com".to_string(), "https://ia2.example.com".to_string()),
            ("https://ta.example.com".to_string(), "https://ta.example.com".to_string()),
        ]
    );
    assert_eq!(fed.transport.fetch_count(), 3);

    let statements: Vec<_> = chain.statements().collect();
    for pair in statements.windows(2) {
        assert_eq!(pair[0].iss, pair[1].sub);
    }
}

#[test]
fn leaf_equal_to_anchor_is_rejected_without_network_access() {
    let fed = direct_federation();
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://ta.example.com"), &anchor())
        .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidRequest(_)));
    assert!(fed.transport.requests().is_empty());
}

#[test]
fn cyclic_hints_terminate() {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity("https://a.example.com", &["https://b.example.com"], json!({}))
        .add_entity("https://b.example.com", &["https://a.example.com"], json!({}))
        .add_entity("https://rp.example.com", &["https://a.example.com"], json!({}));

    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap_err();

    assert!(matches!(err, ResolveError::UnreachableTrustAnchor { .. }));
    let requests = fed.transport.requests();
    let mut unique = requests.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(requests.len(), unique.len(), "an entity was retrieved twice: {requests:?}");
}

#[test]
fn backtracks_out_of_dead_branches() {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity("https://other-ta.example.com", &[], json!({}))
        .add_entity("https://dead.example.com", &["https://other-ta.example.com"], json!({}))
        .add_entity("https://ia.example.com", &["https://ta.example.com"], json!({}))
        .add_entity(
            "https://rp.example.com",
            &["https://gone.example.com", "https://dead.example.com", "https://ia.example.com"],
            json!({}),
        )
        .add_subordinate("https://ta.example.com", "https://ia.example.com", None)
        .add_subordinate("https://ia.example.com", "https://rp.example.com", None);

    let chain = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap();

    assert_eq!(chain.len(), 4);
    assert_eq!(chain.statements().nth(1).unwrap().iss.as_str(), "https://ia.example.com");
}

#[test]
fn hint_naming_the_anchor_wins() {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity("https://ia.example.com", &["https://ta.example.com"], json!({}))
        .add_entity(
            "https://rp.example.com",
            &["https://ia.example.com", "https://ta.example.com"],
            json!({}),
        )
        .add_subordinate("https://ta.example.com", "https://ia.example.com", None)
        .add_subordinate("https://ia.example.com", "https://rp.example.com", None)
        .add_subordinate("https://ta.example.com", "https://rp.example.com", None);

    let chain = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap();

    assert_eq!(chain.len(), 3);
    assert!(!fed
        .transport
        .requests()
        .iter()
        .any(|u| u.starts_with("https://ia.example.com")));
}

#[test]
fn unreachable_leaf_surfaces_retrieval_error() {
    let fed = direct_federation();
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://unknown.example.com"), &anchor())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Retrieval(RetrievalError::NotFound { status: 404, .. })));
}

#[test]
fn server_error_is_temporarily_unavailable() {
    let fed = direct_federation();
    fed.transport
        .serve_status("https://rp.example.com/.well-known/openid-federation", 503);
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Retrieval(RetrievalError::TemporarilyUnavailable { .. })
    ));
}

#[test]
fn missing_subordinate_statement_fails_resolution() {
    let mut fed = Federation::new();
    fed.add_entity("https://ta.example.com", &[], json!({}))
        .add_entity("https://rp.example.com", &["https://ta.example.com"], json!({}));

    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Retrieval(RetrievalError::NotFound { .. })));
}

#[test]
fn subordinate_statement_signed_by_wrong_key_is_invalid() {
    let fed = direct_federation();
    let impostor = StatementSigner::generate().with_kid(fed.signer("https://ta.example.com").kid());
    let statement = oidfed_statement::EntityStatement {
        iss: id("https://ta.example.com"),
        sub: id("https://rp.example.com"),
        iat: NOW,
        exp: NOW + LIFETIME,
        jwks: fed.config("https://rp.example.com").jwks.clone(),
        authority_hints: None,
        metadata: None,
        metadata_policy: None,
        trust_marks: None,
        trust_mark_issuers: None,
    };
    fed.transport.serve(
        fetch_url("https://ta.example.com", "https://rp.example.com"),
        impostor.sign_entity_statement(&statement).unwrap(),
    );

    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Retrieval(RetrievalError::InvalidStatement { .. })));
}

#[test]
fn expired_leaf_configuration_is_rejected() {
    let fed = direct_federation();
    fed.clock.advance(LIFETIME);
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &anchor())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Retrieval(RetrievalError::InvalidStatement { .. })));
}

#[test]
fn pinned_anchor_keys_must_match() {
    let fed = direct_federation();
    let pinned = anchor().with_jwks(fed.signer("https://ta.example.com").jwks());
    assert!(TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &pinned)
        .is_ok());

    let wrong = anchor().with_jwks(StatementSigner::generate().jwks());
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&RequestContext::new(), &id("https://rp.example.com"), &wrong)
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidTrustChain(_)));
}

#[test]
fn elapsed_deadline_cancels_instead_of_succeeding() {
    let fed = direct_federation();
    let ctx = RequestContext::with_deadline(Instant::now() - Duration::from_secs(1));
    let err = TrustChainResolver::new(fed.retriever())
        .resolve(&ctx, &id("https://rp.example.com"), &anchor())
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(fed.transport.requests().is_empty());
}
