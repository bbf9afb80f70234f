pub mod files;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use shared::http::serve_http;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::state::NodeState;

pub use routes::build_router;

pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    state: NodeState,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("HTTP file endpoint listening on {}", listener.local_addr()?);
    serve_http(listener, tls, Arc::new(build_router()), state, shutdown).await
}
