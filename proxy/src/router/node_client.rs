use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::header::{AUTHORIZATION, HOST};
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use shared::http::{ResponseBody, proxied_body, reader_body};
use shared::net::BoxedConn;
use shared::signature::{self, SharedSecret};
use shared::tls::server_name;
use shared::types::NodeInfo;
use shared::{AppError, IdenPayload, RequestType};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Limit on TCP connect plus TLS handshake to a node.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How a node connection ends when dropped without a shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Close {
    Graceful,
    /// `SO_LINGER` 0: closing sends RST instead of FIN.
    Reset,
}

/// Talks to storage nodes on behalf of the proxy. Every request carries a
/// fresh nonce signed with the current shared secret.
#[derive(Clone)]
pub struct NodeClient {
    secret: SharedSecret,
    tls: TlsConnector,
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient").finish_non_exhaustive()
    }
}

impl NodeClient {
    pub fn new(secret: SharedSecret, tls: TlsConnector) -> Self {
        Self { secret, tls }
    }

    // ── Raw TCP ──────────────────────────────────────────────────────────────

    /// Stream `file_id` from the node's TCP endpoint. The body ends when the
    /// node closes the connection.
    pub async fn fetch_tcp(&self, node: &NodeInfo, file_id: Uuid) -> Result<ResponseBody, AppError> {
        let port = node.tcp_port().ok_or_else(|| {
            error!("Node {} has no TCP endpoint", node.id);
            AppError::Internal
        })?;

        let mut conn = self.dial(node, port).await?;
        let handshake = self.handshake(file_id, RequestType::Read)?;
        conn.write_all(&handshake).await.map_err(|e| {
            warn!("Sending handshake to node {} failed: {}", node.id, e);
            AppError::UpstreamUnavailable
        })?;

        debug!("Reading {} from node {} over TCP", file_id, node.id);
        Ok(reader_body(conn))
    }

    /// Write everything `content` yields to `file_id` on the node, then
    /// wait for the node to close its side. Nothing is kept on the node
    /// when `content` fails partway.
    pub async fn upload_tcp<R>(
        &self,
        node: &NodeInfo,
        file_id: Uuid,
        content: &mut R,
    ) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let port = node.tcp_port().ok_or_else(|| {
            AppError::BadRequest(format!("Node {} does not accept TCP uploads", node.id))
        })?;

        // Dropped without a shutdown, the connection resets, so a copy that
        // fails here fails on the node too and the partial file is removed.
        let mut conn = self.connect(node, port, Close::Reset).await?;
        let handshake = self.handshake(file_id, RequestType::Write)?;

        let transfer = async {
            conn.write_all(&handshake).await?;
            let written = tokio::io::copy(content, &mut conn).await?;
            conn.shutdown().await?;
            let mut rest = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut conn, &mut rest).await?;
            Ok::<_, std::io::Error>(written)
        };

        let written = transfer.await.map_err(|e| {
            warn!("Upload of {} to node {} failed: {}", file_id, node.id, e);
            AppError::UpstreamUnavailable
        })?;

        info!("Uploaded {} bytes as {} to node {}", written, file_id, node.id);
        Ok(written)
    }

    // ── HTTP ─────────────────────────────────────────────────────────────────

    /// `GET /file/{id}?rnd=<nonce>` against the node's HTTP endpoint.
    pub async fn fetch_http(&self, node: &NodeInfo, file_id: Uuid) -> Result<ResponseBody, AppError> {
        let conn = self.dial(node, node.http_port).await?;
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(conn))
            .await
            .map_err(|e| {
                warn!("HTTP handshake with node {} failed: {}", node.id, e);
                AppError::UpstreamUnavailable
            })?;

        let node_id = node.id;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Connection to node {} ended: {}", node_id, e);
            }
        });

        let rnd = signature::nonce();
        let request = Request::get(format!("/file/{}?rnd={}", file_id, rnd))
            .header(HOST, node.authority(node.http_port))
            .header(
                AUTHORIZATION,
                format!("Signature {}", self.secret.sign(rnd.as_bytes())),
            )
            .body(Empty::<Bytes>::new())
            .map_err(|e| {
                error!("Failed to build node request: {}", e);
                AppError::Internal
            })?;

        let response = sender.send_request(request).await.map_err(|e| {
            warn!("Request to node {} failed: {}", node.id, e);
            AppError::UpstreamUnavailable
        })?;

        if response.status() != StatusCode::OK {
            warn!(
                "Node {} answered {} for {}",
                node.id,
                response.status(),
                file_id
            );
            return Err(AppError::UpstreamUnavailable);
        }

        debug!("Reading {} from node {} over HTTP", file_id, node.id);
        Ok(proxied_body(response.into_body()))
    }

    // ── Plumbing ─────────────────────────────────────────────────────────────

    fn handshake(&self, file_id: Uuid, kind: RequestType) -> Result<Bytes, AppError> {
        let random = signature::nonce();
        let payload = IdenPayload {
            id: file_id.to_string(),
            token: self.secret.sign(random.as_bytes()),
            random,
            kind,
        };
        payload.encode().map_err(|e| {
            error!("Failed to encode handshake: {}", e);
            AppError::Internal
        })
    }

    async fn dial(&self, node: &NodeInfo, port: u16) -> Result<BoxedConn, AppError> {
        self.connect(node, port, Close::Graceful).await
    }

    async fn connect(&self, node: &NodeInfo, port: u16, close: Close) -> Result<BoxedConn, AppError> {
        let authority = node.authority(port);

        let connect = async {
            let stream = TcpStream::connect(&authority).await?;
            if close == Close::Reset {
                stream.set_linger(Some(Duration::ZERO))?;
            }
            let conn: BoxedConn = if node.tls {
                let name = server_name(&node.address)?;
                Box::new(self.tls.connect(name, stream).await?)
            } else {
                Box::new(stream)
            };
            Ok::<_, anyhow::Error>(conn)
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                warn!("Connecting to node {} at {} failed: {:#}", node.id, authority, e);
                Err(AppError::UpstreamUnavailable)
            }
            Err(_) => {
                warn!("Connecting to node {} at {} timed out", node.id, authority);
                Err(AppError::UpstreamUnavailable)
            }
        }
    }
}
