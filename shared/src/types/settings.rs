use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

// ---------------------------------------------------------------------------
// Shared sections
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// `node.toml`. Written back to disk whenever the shared secret rotates, so
/// it derives `Serialize` as well.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: Uuid,
    pub key: String,
    pub app: NodeAppConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NodeAppConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tcp_port")]
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_tcp_port(),
        }
    }
}

impl NodeAppConfig {
    /// e.g. `"0.0.0.0:8080"`
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// `None` when the raw TCP listener is disabled.
    pub fn tcp_addr(&self) -> Option<String> {
        self.tcp
            .enabled
            .then(|| format!("{}:{}", self.bind, self.tcp.port))
    }
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

/// `proxy.toml`
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Shared secret known to every node. `APP_KEY` takes priority.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub server: ProxyServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    pub auth: ProxyAuthConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
        }
    }
}

/// Longest user session a config may ask for (30 days).
pub const MAX_USER_TOKEN_MINUTES: u64 = 30 * 24 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyAuthConfig {
    /// HS256 key for file-access grants. `APP_JWT_HMAC_KEY` takes priority.
    #[serde(default)]
    pub jwt_hmac_key: Option<String>,
    /// PKCS#8 PEM Ed25519 private key used to sign user tokens.
    pub ed_private_key: PathBuf,
    /// SPKI PEM Ed25519 public key used to verify user tokens.
    pub ed_public_key: PathBuf,
    #[serde(default = "default_user_token_minutes")]
    pub user_token_minutes: u64,
    #[serde(default)]
    pub allow_signup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

impl ProxyServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl ProxyConfig {
    /// Resolve the node shared secret with `APP_KEY` taking priority over the
    /// config file field.
    pub fn resolved_key(&self) -> Option<String> {
        pick_secret(std::env::var("APP_KEY").ok(), self.key.as_deref())
    }
}

impl ProxyAuthConfig {
    /// Resolve the file-access HMAC key with `APP_JWT_HMAC_KEY` taking
    /// priority over the config file field.
    pub fn resolved_hmac_key(&self) -> Option<String> {
        pick_secret(
            std::env::var("APP_JWT_HMAC_KEY").ok(),
            self.jwt_hmac_key.as_deref(),
        )
    }

    pub fn user_token_secs(&self) -> u64 {
        self.user_token_minutes.saturating_mul(60)
    }
}

/// First non-empty of the environment value and the file value.
pub fn pick_secret(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|s| !s.is_empty())
        .or_else(|| file.map(str::to_string))
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_tcp_port() -> u16 {
    2022
}

pub fn default_true() -> bool {
    true
}

pub fn default_user_token_minutes() -> u64 {
    60
}

pub fn default_database_url() -> String {
    "sqlite://proxy.db".to_string()
}

pub fn default_lookup_timeout() -> u64 {
    5
}
