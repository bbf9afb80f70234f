use hyper::header::HeaderMap;
use shared::AppError;
use shared::http::{get_bearer_token, query_params};
use shared::types::{FileAccessJwtPayload, FilePermission, UserJwtPayload};
use tracing::warn;
use uuid::Uuid;

use crate::auth::CredentialService;

/// Who is asking for a file.
#[derive(Debug, Clone)]
pub enum Caller {
    /// A signed-in user; must own the file.
    User(UserJwtPayload),
    /// A file-access grant already scoped to the requested file.
    Grant(FileAccessJwtPayload),
}

/// Resolve the caller of a download of `raw_id`.
///
/// A `Bearer` header wins over `?access_token=`. A grant must name the
/// requested file and carry the read bit.
pub fn authenticate_download(
    credentials: &CredentialService,
    headers: &HeaderMap,
    query: Option<&str>,
    raw_id: &str,
) -> Result<Caller, AppError> {
    if let Some(token) = get_bearer_token(headers)? {
        return credentials.decode_user_token(&token).map(Caller::User);
    }

    let Some(token) = query_params(query).remove("access_token") else {
        return Err(AppError::Unauthorized);
    };

    let grant = credentials.decode_file_access_token(&token)?;
    if Uuid::parse_str(raw_id).ok() != Some(grant.sub) {
        warn!("File grant for {} presented for {}", grant.sub, raw_id);
        return Err(AppError::Forbidden);
    }
    if !grant.perm.contains(FilePermission::READ) {
        warn!("File grant for {} lacks read permission", grant.sub);
        return Err(AppError::Forbidden);
    }

    Ok(Caller::Grant(grant))
}

/// The bearer user token, required.
pub fn authenticate_user(
    credentials: &CredentialService,
    headers: &HeaderMap,
) -> Result<UserJwtPayload, AppError> {
    let token = get_bearer_token(headers)?.ok_or(AppError::Unauthorized)?;
    credentials.decode_user_token(&token)
}
