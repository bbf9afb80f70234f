//! Raw TCP file endpoint.
//!
//! One connection carries one transfer:
//! `accepted -> awaiting handshake -> authenticated -> streaming -> closed`.
//! Every rejection is a silent close; the peer never receives an error frame.

pub mod handlers;
pub mod handshake;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use shared::RequestType;
use shared::net::accept_loop;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::state::NodeState;

pub use handshake::HandshakeError;

/// How long a fresh connection may take to deliver its handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    state: NodeState,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("TCP file endpoint listening on {}", listener.local_addr()?);

    accept_loop(listener, tls, shutdown, move |conn, peer| {
        let state = state.clone();
        handle_connection(conn, peer, state)
    })
    .await
}

/// Drive one connection to completion. Never returns an error: failures are
/// logged and the connection is dropped.
pub async fn handle_connection<C>(mut conn: C, peer: SocketAddr, state: NodeState)
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    info!("Incoming conn {}", peer);

    let read = handshake::read_handshake_within(&mut conn, HANDSHAKE_TIMEOUT).await;
    let (payload, head) = match read {
        Ok(pair) => pair,
        Err(e) => {
            info!("Conn {} rejected: {}", peer, e);
            return;
        }
    };

    let id = match handshake::authenticate(&payload, &state.secret) {
        Ok(id) => id,
        Err(e) => {
            warn!("Conn {} rejected: {}", peer, e);
            return;
        }
    };

    match payload.kind {
        RequestType::Read => {
            match handlers::handle_read(&state.store, &id, &mut conn).await {
                Ok(n) => debug!("Sent {} bytes of {} to {}", n, id, peer),
                Err(e) => info!("Read of {} for {} ended early: {}", id, peer, e),
            }
        }
        RequestType::Write => {
            match handlers::handle_write(&state.store, &id, head, &mut conn).await {
                Ok(n) => info!("Stored {} bytes as {} from {}", n, id, peer),
                Err(e) => info!("Write of {} from {} failed: {}", id, peer, e),
            }
        }
    }

    let _ = conn.shutdown().await;
    info!("Conn {} closed", peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::settings::{NodeAppConfig, TcpConfig};
    use shared::types::{NodeConfig, TlsConfig};
    use tokio_test::io::Builder;
    use uuid::Uuid;

    fn state(dir: &tempfile::TempDir) -> NodeState {
        let config = NodeConfig {
            id: Uuid::new_v4(),
            key: "k1".into(),
            app: NodeAppConfig {
                data_dir: dir.path().to_path_buf(),
                bind: "127.0.0.1".into(),
                port: 0,
                tcp: TcpConfig::default(),
                tls: TlsConfig::default(),
            },
        };
        NodeState::new(config, dir.path().join("node.toml"))
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_is_dropped_after_the_handshake_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let started = tokio::time::Instant::now();

        // Any write to the mock would panic: rejection stays silent.
        let conn = Builder::new().wait(HANDSHAKE_TIMEOUT * 2).build();
        handle_connection(conn, "127.0.0.1:9".parse().unwrap(), state(&dir)).await;

        let waited = started.elapsed();
        assert!(waited >= HANDSHAKE_TIMEOUT);
        assert!(waited < HANDSHAKE_TIMEOUT * 2);
    }
}
