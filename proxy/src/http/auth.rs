use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use shared::AppError;
use shared::http::{HandlerResult, PathParams, read_json};
use shared::types::login::is_valid_email;
use shared::types::{DataResponse, NewUser, SignInBody, SignUpBody, UserRole};
use tracing::{error, info, warn};

use super::respond;
use crate::auth::password::hash_password_blocking;
use crate::catalog::CatalogError;
use crate::state::AppState;

/// `POST /auth/signin` → `201 {data: <user token>, message}`.
pub async fn sign_in(req: Request<Incoming>, state: AppState, _params: PathParams) -> HandlerResult {
    let body: SignInBody = read_json(req.into_body()).await?;

    if body.email.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest("Missing email or password".into()));
    }
    if !is_valid_email(&body.email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }

    let issued = state
        .credentials
        .login(state.catalog.as_ref(), &body.email, &body.password)
        .await?;

    respond(&DataResponse::success(issued.token), StatusCode::CREATED)
}

/// `POST /auth/signup` → `201 {data: <user>, message}`. Closed unless
/// `allow_signup` is set.
pub async fn sign_up(req: Request<Incoming>, state: AppState, _params: PathParams) -> HandlerResult {
    if !state.allow_signup {
        warn!("Signup attempt while signup is disabled");
        return Err(AppError::SignupDisabled);
    }

    let body: SignUpBody = read_json(req.into_body()).await?;
    body.validate().map_err(|e| {
        warn!("Signup validation failed: {:?}", e);
        AppError::BadRequest(e.to_message())
    })?;

    let password_hash = hash_password_blocking(body.password).await.map_err(|e| {
        error!("{:#}", e);
        AppError::Internal
    })?;

    let view = state
        .catalog
        .create_user(NewUser {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password_hash,
            role: UserRole::User,
        })
        .await
        .map_err(|e| match e {
            CatalogError::Duplicate => AppError::Conflict,
            other => {
                error!("Failed to create user: {}", other);
                AppError::Internal
            }
        })?;

    info!("New account {} registered", view.id);
    respond(&DataResponse::success(view), StatusCode::CREATED)
}
