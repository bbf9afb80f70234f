use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use shared::SharedSecret;
use shared::config::load_proxy_config;
use shared::tls::insecure_connector;
use shared::types::{ConfigError, ProxyConfig};
use tracing::info;

use crate::auth::{CredentialService, FileTokenKey, UserTokenKeys};
use crate::catalog::Catalog;
use crate::router::{FileRouter, NodeClient};

/// Shared by every request handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
    pub catalog: Arc<dyn Catalog>,
    pub files: FileRouter,
    /// Node shared secret; rotated in place on reload.
    pub secret: SharedSecret,
    pub allow_signup: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("allow_signup", &self.allow_signup)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: &ProxyConfig,
        user_keys: UserTokenKeys,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        let key = config
            .resolved_key()
            .ok_or_else(|| anyhow!("No node shared secret configured (key or APP_KEY)"))?;
        let hmac = config
            .auth
            .resolved_hmac_key()
            .ok_or_else(|| anyhow!("No file token key configured (jwt_hmac_key or APP_JWT_HMAC_KEY)"))?;

        let credentials = CredentialService::new(
            user_keys,
            FileTokenKey::from_secret(hmac.as_bytes()),
            config.auth.user_token_secs(),
        );

        let secret = SharedSecret::new(key);
        let nodes = NodeClient::new(
            secret.clone(),
            insecure_connector().context("Failed to build node TLS client")?,
        );
        let files = FileRouter::new(
            catalog.clone(),
            nodes,
            Duration::from_secs(config.catalog.lookup_timeout_secs),
        );

        Ok(Self {
            credentials: Arc::new(credentials),
            catalog,
            files,
            secret,
            allow_signup: config.auth.allow_signup,
        })
    }

    /// Re-read `path` and switch to its node secret if it differs from the
    /// one in use. Other settings take effect on restart.
    pub fn reload(&self, path: &Path) -> Result<bool, ConfigError> {
        let config = load_proxy_config(path)?;
        let key = config.resolved_key().ok_or_else(|| {
            ConfigError::InvalidConfig("No node shared secret configured".into())
        })?;

        if self.secret.is_current(&key) {
            info!("Node secret unchanged");
            return Ok(false);
        }

        // Nothing to persist: the proxy's copy lives in its own config file.
        if let Err(never) = self.secret.rotate(key, |_| Ok::<(), Infallible>(())) {
            match never {}
        }
        Ok(true)
    }
}
