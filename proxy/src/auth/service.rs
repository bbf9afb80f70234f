use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use shared::AppError;
use shared::types::{FileAccessJwtPayload, FilePermission, UserCredential, UserJwtPayload};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::keys::{FileTokenKey, UserTokenKeys};
use super::password::verify_password_blocking;
use crate::catalog::Catalog;

/// Longest lifetime a file-access grant may be minted with.
pub const MAX_FILE_ACCESS_TTL: u64 = 7 * 24 * 3600;

/// A signed token and the unix second it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Issues and checks the two JWT kinds.
///
/// User tokens are EdDSA, file-access grants HS256. Each decoder pins its own
/// algorithm, so a token of one kind never decodes as the other.
#[derive(Debug)]
pub struct CredentialService {
    user_keys: UserTokenKeys,
    file_key: FileTokenKey,
    session_secs: u64,
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CredentialService {
    pub fn new(user_keys: UserTokenKeys, file_key: FileTokenKey, session_secs: u64) -> Self {
        Self {
            user_keys,
            file_key,
            session_secs,
        }
    }

    // ── Login ────────────────────────────────────────────────────────────────

    /// Check `email`/`password` against the catalog and mint a session token.
    ///
    /// Unknown account, deleted account and wrong password all come back as
    /// `AuthFailed`.
    pub async fn login(
        &self,
        catalog: &dyn Catalog,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, AppError> {
        let credential = catalog.get_credential_by_email(email).await.map_err(|e| {
            error!("Credential lookup failed: {}", e);
            AppError::Internal
        })?;

        let Some(credential) = credential.filter(|c| !c.deleted) else {
            warn!("Sign-in rejected: no active account for this email");
            return Err(AppError::AuthFailed);
        };

        let matches =
            verify_password_blocking(credential.password_hash.clone(), password.to_string())
                .await
                .map_err(|e| {
                    error!("Stored hash for user {} is unusable: {:#}", credential.id, e);
                    AppError::AuthFailed
                })?;

        if !matches {
            warn!("Sign-in rejected: wrong password for user {}", credential.id);
            return Err(AppError::AuthFailed);
        }

        info!("User {} signed in", credential.id);
        self.mint_user_token(&credential)
    }

    // ── Minting ──────────────────────────────────────────────────────────────

    pub fn mint_user_token(&self, user: &UserCredential) -> Result<IssuedToken, AppError> {
        self.mint_user_token_at(user, now_secs())
    }

    pub fn mint_user_token_at(
        &self,
        user: &UserCredential,
        now: u64,
    ) -> Result<IssuedToken, AppError> {
        let claims = UserJwtPayload {
            sub: user.id,
            email: user.email.clone(),
            iat: now,
            exp: now.saturating_add(self.session_secs),
            role: user.role,
        };

        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &claims,
            &self.user_keys.encoding,
        )
        .map_err(|e| {
            error!("Failed to sign user token: {}", e);
            AppError::Internal
        })?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn mint_file_access(
        &self,
        file_id: Uuid,
        perm: FilePermission,
        ttl_secs: u64,
    ) -> Result<IssuedToken, AppError> {
        self.mint_file_access_at(file_id, perm, ttl_secs, now_secs())
    }

    pub fn mint_file_access_at(
        &self,
        file_id: Uuid,
        perm: FilePermission,
        ttl_secs: u64,
        now: u64,
    ) -> Result<IssuedToken, AppError> {
        if !perm.is_valid() {
            return Err(AppError::BadRequest(format!(
                "Invalid permission bits: {}",
                perm.0
            )));
        }
        if ttl_secs == 0 || ttl_secs > MAX_FILE_ACCESS_TTL {
            return Err(AppError::BadRequest(format!(
                "ttl_secs must be between 1 and {}",
                MAX_FILE_ACCESS_TTL
            )));
        }

        let claims = FileAccessJwtPayload {
            sub: file_id,
            iat: now,
            exp: now + ttl_secs,
            perm,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.file_key.encoding)
            .map_err(|e| {
                error!("Failed to sign file-access token: {}", e);
                AppError::Internal
            })?;

        debug!("Minted file-access grant for {} (perm {})", file_id, perm.0);
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    // ── Decoding ─────────────────────────────────────────────────────────────

    pub fn decode_user_token(&self, token: &str) -> Result<UserJwtPayload, AppError> {
        self.decode_user_token_at(token, now_secs())
    }

    pub fn decode_user_token_at(&self, token: &str, now: u64) -> Result<UserJwtPayload, AppError> {
        let claims = decode::<UserJwtPayload>(
            token,
            &self.user_keys.decoding,
            &claims_validation(Algorithm::EdDSA),
        )
        .map_err(rejected)?
        .claims;

        check_expiry(claims.exp, now)?;
        Ok(claims)
    }

    pub fn decode_file_access_token(&self, token: &str) -> Result<FileAccessJwtPayload, AppError> {
        self.decode_file_access_token_at(token, now_secs())
    }

    pub fn decode_file_access_token_at(
        &self,
        token: &str,
        now: u64,
    ) -> Result<FileAccessJwtPayload, AppError> {
        let claims = decode::<FileAccessJwtPayload>(
            token,
            &self.file_key.decoding,
            &claims_validation(Algorithm::HS256),
        )
        .map_err(rejected)?
        .claims;

        check_expiry(claims.exp, now)?;
        Ok(claims)
    }
}

// Expiry is checked by hand against a caller-supplied clock with no leeway.
fn claims_validation(alg: Algorithm) -> Validation {
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

fn check_expiry(exp: u64, now: u64) -> Result<(), AppError> {
    if exp < now {
        return Err(AppError::ExpiredToken);
    }
    Ok(())
}

fn rejected(e: jsonwebtoken::errors::Error) -> AppError {
    debug!("Token rejected: {:?}", e.kind());
    AppError::InvalidToken
}
