use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use shared::AppError;
use shared::http::{HandlerResult, PathParams, read_json};
use shared::types::{DataResponse, ShareRequest, ShareResponse};
use tracing::{info, warn};
use uuid::Uuid;

use super::respond;
use crate::router::authenticate_user;
use crate::state::AppState;

/// `POST /files/:id/share` with `{perm, ttl_secs}`. Only the owner may mint
/// a grant for a file.
pub async fn share_file(req: Request<Incoming>, state: AppState, params: PathParams) -> HandlerResult {
    let user = authenticate_user(&state.credentials, req.headers())?;

    let file_id = params
        .get("id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(AppError::InvalidUuid)?;

    let info = state.files.lookup(file_id).await?;
    if info.owner_id != user.sub {
        warn!("User {} tried to share file {} they do not own", user.sub, file_id);
        return Err(AppError::Forbidden);
    }

    let request: ShareRequest = read_json(req.into_body()).await?;
    let issued = state
        .credentials
        .mint_file_access(file_id, request.perm, request.ttl_secs)?;

    info!(
        "User {} shared file {} for {}s",
        user.sub, file_id, request.ttl_secs
    );
    respond(
        &DataResponse::success(ShareResponse {
            token: issued.token,
            expires_at: issued.expires_at,
        }),
        StatusCode::CREATED,
    )
}
