use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey};

/// EdDSA keypair for user session tokens.
#[derive(Clone)]
pub struct UserTokenKeys {
    pub(crate) encoding: EncodingKey,
    pub(crate) decoding: DecodingKey,
}

/// HS256 secret for file-access grants.
#[derive(Clone)]
pub struct FileTokenKey {
    pub(crate) encoding: EncodingKey,
    pub(crate) decoding: DecodingKey,
}

impl UserTokenKeys {
    /// `private_pem` is PKCS#8, `public_pem` is SPKI.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_ed_pem(private_pem)
                .context("parsing Ed25519 private key")?,
            decoding: DecodingKey::from_ed_pem(public_pem).context("parsing Ed25519 public key")?,
        })
    }

    pub async fn load(private_key: &Path, public_key: &Path) -> Result<Self> {
        let private_pem = tokio::fs::read(private_key)
            .await
            .with_context(|| format!("reading `{}`", private_key.display()))?;
        let public_pem = tokio::fs::read(public_key)
            .await
            .with_context(|| format!("reading `{}`", public_key.display()))?;
        Self::from_pem(&private_pem, &public_pem)
    }
}

impl FileTokenKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for UserTokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserTokenKeys(..)")
    }
}

impl fmt::Debug for FileTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileTokenKey(..)")
    }
}
