use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::types::settings::{
    ConfigError, MAX_USER_TOKEN_MINUTES, NodeConfig, ProxyConfig, TlsConfig,
};

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path.display());

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    Ok(toml::from_str(&contents)?)
}

pub fn load_node_config(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = read_toml(path.as_ref())?;
    info!("Configuration loaded successfully");

    validate_node_config(&config)?;
    info!("Config validated");

    Ok(config)
}

pub fn load_proxy_config(path: impl AsRef<Path>) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = read_toml(path.as_ref())?;
    info!("Configuration loaded successfully");

    validate_proxy_config(&config)?;
    info!("Config validated");

    Ok(config)
}

/// Rewrite `node.toml`. The document goes to a sibling temp file first and is
/// renamed over the original so a crash never leaves a half-written config.
pub fn save_node_config(path: impl AsRef<Path>, config: &NodeConfig) -> Result<(), ConfigError> {
    let path = path.as_ref();
    validate_node_config(config)?;

    let contents = toml::to_string_pretty(config)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;

    info!("Configuration written to: {}", path.display());
    Ok(())
}

pub fn validate_node_config(config: &NodeConfig) -> Result<(), ConfigError> {
    if config.key.len() < 2 {
        return Err(ConfigError::InvalidConfig(
            "key must be at least 2 characters long".into(),
        ));
    }

    if config.app.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "app.data_dir cannot be empty".into(),
        ));
    }

    if config.app.tcp.enabled && config.app.tcp.port == 0 {
        return Err(ConfigError::InvalidConfig(
            "app.tcp.port must be set when tcp is enabled".into(),
        ));
    }

    validate_tls(&config.app.tls, "app.tls")
}

pub fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    match config.resolved_key() {
        None => {
            return Err(ConfigError::InvalidConfig(
                "key must be set via the APP_KEY env var or the key config field".into(),
            ));
        }
        Some(key) if key.len() < 2 => {
            return Err(ConfigError::InvalidConfig(
                "key must be at least 2 characters long".into(),
            ));
        }
        _ => {}
    }

    match config.auth.resolved_hmac_key() {
        None => {
            return Err(ConfigError::InvalidConfig(
                "jwt_hmac_key must be set via the APP_JWT_HMAC_KEY env var or auth.jwt_hmac_key"
                    .into(),
            ));
        }
        Some(secret) if secret.len() < 32 => {
            return Err(ConfigError::InvalidConfig(
                "jwt_hmac_key must be at least 32 characters long".into(),
            ));
        }
        _ => {}
    }

    if config.auth.user_token_minutes == 0
        || config.auth.user_token_minutes > MAX_USER_TOKEN_MINUTES
    {
        return Err(ConfigError::InvalidConfig(format!(
            "user_token_minutes must be between 1 and {}",
            MAX_USER_TOKEN_MINUTES
        )));
    }

    if config.catalog.lookup_timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "lookup_timeout_secs must be greater than 0".into(),
        ));
    }

    validate_tls(&config.tls, "tls")
}

fn validate_tls(tls: &TlsConfig, section: &str) -> Result<(), ConfigError> {
    if tls.enabled && (tls.cert.is_none() || tls.key.is_none()) {
        return Err(ConfigError::InvalidConfig(format!(
            "{section}.cert and {section}.key are required when tls is enabled"
        )));
    }
    Ok(())
}
