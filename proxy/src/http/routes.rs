use hyper::StatusCode;
use shared::http::Router;

use super::{auth, files, respond, share};
use crate::state::AppState;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .get("/health", |_req, _state, _params| async {
            respond(
                &serde_json::json!({ "status": "success", "health": "ok" }),
                StatusCode::OK,
            )
        })
        .post("/auth/signin", auth::sign_in)
        .post("/auth/signup", auth::sign_up)
        .get("/files/:id", files::get_file)
        .get("/file/:id", files::get_file)
        .post("/files/:id/share", share::share_file)
}
