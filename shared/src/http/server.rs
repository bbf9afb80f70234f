use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use super::router::Router;
use crate::net::accept_loop;

/// Serve `router` over HTTP/1.1 on `listener` until `shutdown` resolves.
pub async fn serve_http<S>(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    router: Arc<Router<S>>,
    state: S,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    S: Clone + Send + Sync + 'static,
{
    accept_loop(listener, tls, shutdown, move |conn, peer| {
        let router = router.clone();
        let state = state.clone();
        async move {
            let io = TokioIo::new(conn);
            let service = service_fn(move |req| {
                let router = router.clone();
                let state = state.clone();
                async move { Ok::<_, Infallible>(router.route(req, state).await) }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                debug!("Error serving connection from {}: {:?}", peer, err);
            }
        }
    })
    .await
}
