pub mod auth;
pub mod files;
pub mod routes;
pub mod share;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use hyper::StatusCode;
use serde::Serialize;
use shared::AppError;
use shared::http::{HandlerResult, deliver_serialized_json, serve_http};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

use crate::state::AppState;

pub use routes::build_router;

pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("Proxy listening on {}", listener.local_addr()?);
    serve_http(listener, tls, Arc::new(build_router()), state, shutdown).await
}

fn respond<T: Serialize>(data: &T, status: StatusCode) -> HandlerResult {
    deliver_serialized_json(data, status).map_err(|e| {
        error!("{:#}", e);
        AppError::Internal
    })
}
