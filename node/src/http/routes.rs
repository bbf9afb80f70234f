use hyper::StatusCode;
use shared::http::{Router, deliver_serialized_json};
use shared::AppError;

use super::files;
use crate::state::NodeState;

pub fn build_router() -> Router<NodeState> {
    Router::new()
        .get("/health", |_req, state: NodeState, _params| async move {
            let body = serde_json::json!({
                "status": "success",
                "health": "ok",
                "node": state.config().id,
            });
            deliver_serialized_json(&body, StatusCode::OK).map_err(|_| AppError::Internal)
        })
        .get("/file/:id", files::get_file)
}
