use hyper::Request;
use hyper::body::Incoming;
use shared::http::{HandlerResult, PathParams};

use crate::router::authenticate_download;
use crate::state::AppState;

/// `GET /files/:id` (and `/file/:id`). Authenticated by a bearer user token
/// or an `access_token` grant for this file.
pub async fn get_file(req: Request<Incoming>, state: AppState, params: PathParams) -> HandlerResult {
    let raw_id = params.get("id").unwrap_or_default();

    let caller = authenticate_download(
        &state.credentials,
        req.headers(),
        req.uri().query(),
        raw_id,
    )?;

    state.files.get_file(&caller, raw_id).await?.into_response()
}
