use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// A plain or TLS-wrapped byte stream.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedConn = Box<dyn Connection>;

/// Accept connections until `shutdown` resolves, one task per connection.
///
/// The TLS handshake (when `tls` is set) runs inside the spawned task so a
/// slow client never blocks the accept loop. Tasks already running when
/// `shutdown` fires are left to finish.
pub async fn accept_loop<F, Fut>(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    shutdown: impl Future<Output = ()>,
    handle: F,
) -> Result<()>
where
    F: Fn(BoxedConn, SocketAddr) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                info!("Listener on {} shutting down", local);
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Accept failed on {}: {}", local, e);
                    continue;
                }
            },
        };

        debug!("Accepted connection from {} on {}", peer, local);

        let tls = tls.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            let conn: BoxedConn = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(s) => Box::new(s),
                    Err(e) => {
                        warn!("TLS handshake with {} failed: {}", peer, e);
                        return;
                    }
                },
                None => Box::new(stream),
            };
            handle(conn, peer).await;
        });
    }
}
