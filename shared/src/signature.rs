//! Keyed digest the proxy uses to prove a node request came from it.
//!
//! `signature = hex(sha256(message || key))`. The message is a per-request
//! nonce picked by the proxy; the key is the shared secret configured on
//! every node. There is no replay window: a captured (nonce, signature) pair
//! stays valid until the secret is rotated.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::info;

/// Raw nonce length in bytes; the hex form is twice as long.
pub const NONCE_LEN: usize = 24;

/// `hex(sha256(message || key))`, lowercase.
pub fn sign(message: &[u8], key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.update(key);
    hex::encode(hasher.finalize())
}

/// Recompute the digest and compare it to `candidate` in constant time.
pub fn verify(message: &[u8], key: &[u8], candidate: &str) -> bool {
    let expected = sign(message, key);
    constant_time_eq(expected.as_bytes(), candidate.as_bytes())
}

/// Fresh random nonce, hex encoded (48 chars).
pub fn nonce() -> String {
    let mut raw = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// The rotating shared secret, readable concurrently by every request.
///
/// The key itself never leaves this type: callers can only sign, verify or
/// rotate. Guards are released before returning so no lock is ever held
/// across an `.await`.
#[derive(Clone)]
pub struct SharedSecret(Arc<RwLock<String>>);

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

impl SharedSecret {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(key.into())))
    }

    pub fn sign(&self, message: &[u8]) -> String {
        let key = self.read();
        sign(message, key.as_bytes())
    }

    pub fn verify(&self, message: &[u8], candidate: &str) -> bool {
        let key = self.read();
        verify(message, key.as_bytes(), candidate)
    }

    /// Whether `key` is the secret currently in use.
    pub fn is_current(&self, key: &str) -> bool {
        let current = self.read();
        constant_time_eq(current.as_bytes(), key.as_bytes())
    }

    /// Replace the secret. `persist` runs under the exclusive lock before the
    /// swap; if it fails the old secret stays in place.
    pub fn rotate<F, E>(&self, new_key: impl Into<String>, persist: F) -> Result<(), E>
    where
        F: FnOnce(&str) -> Result<(), E>,
    {
        let new_key = new_key.into();
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);

        persist(&new_key)?;
        *guard = new_key;

        info!("Shared secret rotated");
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
