use std::io;

use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use shared::AppError;
use shared::http::{HandlerResult, PathParams, get_signature, query_params, reader_body};
use tracing::{error, warn};
use uuid::Uuid;

use crate::state::NodeState;

/// Shortest nonce the endpoint accepts.
const MIN_NONCE_LEN: usize = 2;

/// `GET /file/:id?rnd=<nonce>` with `Authorization: Signature <hex>`.
///
/// The signature covers the nonce only. The response streams the raw file
/// with its exact `Content-Length`.
pub async fn get_file<B>(req: Request<B>, state: NodeState, params: PathParams) -> HandlerResult {
    let id = params
        .get("id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(AppError::InvalidUuid)?;

    let query = query_params(req.uri().query());
    let rnd = query
        .get("rnd")
        .filter(|r| r.len() >= MIN_NONCE_LEN)
        .ok_or(AppError::MissingNonce)?;

    let signature = get_signature(req.headers())?;
    if !state.secret.verify(rnd.as_bytes(), &signature) {
        warn!("Rejected download of {}: invalid signature", id);
        return Err(AppError::InvalidSignature);
    }

    let (file, len) = state.store.open(&id).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            error!("Registered file '{}' could not be found in storage", id);
            AppError::NotFound
        }
        _ => {
            error!("Failed to open '{}': {}", id, e);
            AppError::Internal
        }
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, len)
        .body(reader_body(file))
        .map_err(|e| {
            error!("Failed to build file response: {}", e);
            AppError::Internal
        })
}
