//! Server configuration loading from file and environment variables.

use oidfed_db::{PoolSettings, StoreLocation};
use oidfed_federation::TrustAnchor;
use oidfed_types::EntityIdentifier;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// This node's place in the federation.
    #[serde(default)]
    pub federation: FederationConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

impl DatabaseConfig {
    pub fn location(&self) -> StoreLocation {
        StoreLocation::from_config(&self.path)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            max_connections: self.pool_max_size,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "oidfed_federation=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Federation settings of this node.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// The node's entity identifier. Endpoints are published under it.
    #[serde(default = "default_entity_id")]
    pub entity_id: String,

    /// File holding the node's Ed25519 seed. Generated on first start.
    #[serde(default = "default_signing_key_path")]
    pub signing_key_path: String,

    /// Superiors this node names in its entity configuration.
    #[serde(default)]
    pub authority_hints: Vec<EntityIdentifier>,

    #[serde(default)]
    pub organization_name: Option<String>,

    /// Lifetime of every statement the node signs.
    #[serde(default = "default_statement_lifetime_secs")]
    pub statement_lifetime_secs: u64,

    /// How long subordinate records are served from cache.
    #[serde(default = "default_subordinate_cache_ttl_secs")]
    pub subordinate_cache_ttl_secs: u64,

    /// Upper bound on a single outbound request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Upper bound on one resolve request, across all its retrievals.
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,

    /// Trust anchors the resolve endpoint accepts.
    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchor>,
}

impl FederationConfig {
    /// The validated [`entity_id`](Self::entity_id).
    pub fn entity_id(&self) -> Result<EntityIdentifier, ConfigError> {
        Ok(EntityIdentifier::parse(&self.entity_id)?)
    }

    pub fn statement_lifetime(&self) -> Duration {
        Duration::from_secs(self.statement_lifetime_secs)
    }

    pub fn subordinate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.subordinate_cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// The configured anchor with identifier `entity_id`.
    pub fn trust_anchor(&self, entity_id: &EntityIdentifier) -> Option<&TrustAnchor> {
        self.trust_anchors.iter().find(|a| &a.entity_id == entity_id)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "oidfed.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_entity_id() -> String {
    "https://localhost:3000".to_string()
}

fn default_signing_key_path() -> String {
    "oidfed.key".to_string()
}

fn default_statement_lifetime_secs() -> u64 {
    86_400
}

fn default_subordinate_cache_ttl_secs() -> u64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_resolve_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            entity_id: default_entity_id(),
            signing_key_path: default_signing_key_path(),
            authority_hints: Vec::new(),
            organization_name: None,
            statement_lifetime_secs: default_statement_lifetime_secs(),
            subordinate_cache_ttl_secs: default_subordinate_cache_ttl_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            trust_anchors: Vec::new(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// `federation.entity_id` is not a valid entity identifier.
    #[error("invalid federation.entity_id: {0}")]
    EntityId(#[from] oidfed_types::IdentifierError),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OIDFED_HOST` overrides `server.host`
/// - `OIDFED_PORT` overrides `server.port`
/// - `OIDFED_DB_PATH` overrides `database.path`
/// - `OIDFED_LOG_LEVEL` overrides `logging.level`
/// - `OIDFED_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `OIDFED_ENTITY_ID` overrides `federation.entity_id`
/// - `OIDFED_SIGNING_KEY_PATH` overrides `federation.signing_key_path`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting `federation.entity_id` is not a valid entity identifier.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.federation.entity_id()?;
    Ok(config)
}

/// Parses a TOML document into a [`Config`].
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("OIDFED_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("OIDFED_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("OIDFED_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("OIDFED_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("OIDFED_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(entity_id) = var("OIDFED_ENTITY_ID") {
        config.federation.entity_id = entity_id;
    }
    if let Some(key_path) = var("OIDFED_SIGNING_KEY_PATH") {
        config.federation.signing_key_path = key_path;
    }
}
