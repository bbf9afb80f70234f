use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;
use rand::rngs::OsRng;
use shared::SharedSecret;
use shared::config::{load_node_config, save_node_config};
use shared::types::{ConfigError, NodeConfig};
use tracing::{info, warn};

use crate::storage::FileStore;

/// Everything a connection handler needs. Cheap to clone.
#[derive(Clone, Debug)]
pub struct NodeState {
    pub secret: SharedSecret,
    pub store: FileStore,
    settings: Arc<NodeSettings>,
}

/// The on-disk config and the path it was loaded from.
struct NodeSettings {
    path: PathBuf,
    current: Mutex<NodeConfig>,
}

impl fmt::Debug for NodeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSettings")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl NodeSettings {
    fn snapshot(&self) -> NodeConfig {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist_key(&self, key: &str) -> Result<(), ConfigError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        next.key = key.to_string();
        save_node_config(&self.path, &next)?;
        *current = next;
        Ok(())
    }

    fn replace(&self, config: NodeConfig) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

impl NodeState {
    pub fn new(config: NodeConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            secret: SharedSecret::new(config.key.clone()),
            store: FileStore::new(config.app.data_dir.clone()),
            settings: Arc::new(NodeSettings {
                path: path.into(),
                current: Mutex::new(config),
            }),
        }
    }

    pub fn config(&self) -> NodeConfig {
        self.settings.snapshot()
    }

    pub fn config_path(&self) -> &Path {
        &self.settings.path
    }

    /// Swap in `new_key`, rewriting the config file first. On a write failure
    /// the old key stays active.
    pub fn rotate_key(&self, new_key: impl Into<String>) -> Result<(), ConfigError> {
        let new_key = new_key.into();
        if new_key.len() < 2 {
            return Err(ConfigError::InvalidConfig(
                "key must be at least 2 characters long".into(),
            ));
        }
        self.secret
            .rotate(new_key, |k| self.settings.persist_key(k))
    }

    /// Re-read the config file and adopt its key if it changed.
    ///
    /// Listener addresses, TLS and the data directory are bound at startup;
    /// changes to them are logged and take effect on restart.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let fresh = load_node_config(&self.settings.path)?;
        let previous = self.settings.snapshot();

        if fresh.app != previous.app || fresh.id != previous.id {
            warn!("Listener, TLS or storage settings changed; restart the node to apply them");
        }

        let rotated = !self.secret.is_current(&fresh.key);
        if rotated {
            // Already on disk; nothing to persist.
            self.secret
                .rotate(fresh.key.clone(), |_| Ok::<(), ConfigError>(()))?;
        }

        self.settings.replace(fresh);
        info!("Configuration reloaded (key rotated: {})", rotated);
        Ok(rotated)
    }
}

/// Fresh random key, 32 bytes hex encoded.
pub fn generate_key() -> String {
    let mut raw = [0u8; 32];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::signature;

    const NODE_TOML: &str = r#"
id = "0b8f4a52-7c1e-4d3a-9f0e-2a6b5c4d3e21"
key = "first-key"

[app]
data_dir = "data"
"#;

    fn state_in(dir: &tempfile::TempDir) -> NodeState {
        let path = dir.path().join("node.toml");
        std::fs::write(&path, NODE_TOML).unwrap();
        let cfg = load_node_config(&path).unwrap();
        NodeState::new(cfg, path)
    }

    #[test]
    fn rotation_rewrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        state.rotate_key("second-key").unwrap();

        let on_disk = load_node_config(state.config_path()).unwrap();
        assert_eq!(on_disk.key, "second-key");
        assert_eq!(state.config().key, "second-key");
        assert!(state.secret.verify(b"rnd", &signature::sign(b"rnd", b"second-key")));
        assert!(!state.secret.verify(b"rnd", &signature::sign(b"rnd", b"first-key")));
    }

    #[test]
    fn failed_write_keeps_old_key() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(dir.path().join("node.toml.tmp")).unwrap();

        assert!(state.rotate_key("second-key").is_err());
        assert!(state.secret.is_current("first-key"));
        assert_eq!(load_node_config(state.config_path()).unwrap().key, "first-key");
    }

    #[test]
    fn too_short_key_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        assert!(state.rotate_key("x").is_err());
        assert!(state.secret.is_current("first-key"));
    }

    #[test]
    fn reload_picks_up_an_edited_key() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        assert!(!state.reload().unwrap());

        std::fs::write(
            state.config_path(),
            NODE_TOML.replace("first-key", "edited-key"),
        )
        .unwrap();

        assert!(state.reload().unwrap());
        assert!(state.secret.is_current("edited-key"));
    }

    #[test]
    fn broken_reload_keeps_running_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        std::fs::write(state.config_path(), "not = [valid").unwrap();
        assert!(state.reload().is_err());
        assert!(state.secret.is_current("first-key"));
    }

    #[test]
    fn generated_keys_are_distinct_hex() {
        let a = generate_key();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_key());
    }
}
