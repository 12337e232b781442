//! oidfed server binary: a federation node serving its entity configuration,
//! subordinate statements and metadata resolution.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, and graceful shutdown on SIGTERM/SIGINT.

use oidfed_db::{open_pool, SqliteSubordinateSource};
use oidfed_federation::{ReqwestTransport, SubordinateDirectory, Transport};
use oidfed_server::{app, config, signing_key, AppState};
use oidfed_types::{Clock, SystemClock};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("OIDFED_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let entity_id = config
        .federation
        .entity_id()
        .expect("federation.entity_id was validated when loading configuration");

    // Open the subordinate store
    let pool = open_pool(&config.database.location(), config.database.pool_settings())
        .expect("failed to open subordinate store, check database.path in config");

    let signer = signing_key::load_or_generate(Path::new(&config.federation.signing_key_path))
        .expect("failed to load federation signing key, check federation.signing_key_path");

    // The blocking client owns its own runtime and must not be created or
    // dropped on this one.
    let http_timeout = config.federation.http_timeout();
    let transport = tokio::task::spawn_blocking(move || ReqwestTransport::new(http_timeout))
        .await
        .expect("transport construction task panicked")
        .expect("failed to build HTTP client");
    let transport: Arc<dyn Transport> = Arc::new(transport);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let directory = SubordinateDirectory::new(
        Arc::new(SqliteSubordinateSource::new(pool)),
        Arc::clone(&clock),
        config.federation.subordinate_cache_ttl(),
    );

    let state = AppState {
        entity_id,
        signer,
        federation: config.federation.clone(),
        directory: Arc::new(directory),
        transport: Arc::clone(&transport),
        clock,
    };

    tracing::info!(
        entity_id = %state.entity_id,
        kid = state.signer.kid(),
        trust_anchors = state.federation.trust_anchors.len(),
        "federation node configured"
    );

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting oidfed server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Release the last handle to the HTTP client off the runtime.
    if let Err(e) = tokio::task::spawn_blocking(move || drop(transport)).await {
        tracing::warn!("failed to release HTTP client: {e}");
    }

    tracing::info!("oidfed server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
