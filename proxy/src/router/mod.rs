//! Download path: authorise the caller, find the node holding the file, pick
//! the transport the node advertises and stream the bytes back.

pub mod authorize;
pub mod filename;
pub mod node_client;

use std::sync::Arc;
use std::time::Duration;

use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use shared::AppError;
use shared::http::{HttpResponse, ResponseBody};
use shared::types::FileNodeInfo;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;

pub use authorize::{Caller, authenticate_download, authenticate_user};
pub use filename::sanitize_file_name;
pub use node_client::NodeClient;

pub const FILE_CHECKSUM: HeaderName = HeaderName::from_static("file-checksum");

/// Which node transport served a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Http,
}

/// A download ready to be sent: catalog metadata plus the node's byte stream.
pub struct FileDownload {
    pub info: FileNodeInfo,
    pub transport: Transport,
    pub body: ResponseBody,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("info", &self.info)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl FileDownload {
    /// 200 with `File-Checksum`, `Content-Type` and an attachment disposition.
    pub fn into_response(self) -> Result<HttpResponse, AppError> {
        let name = sanitize_file_name(&self.info.name, &self.info.content_type);
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        let content_type = HeaderValue::from_str(&self.info.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

        Response::builder()
            .status(StatusCode::OK)
            .header(FILE_CHECKSUM, self.info.checksum.as_str())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_DISPOSITION, disposition)
            .body(self.body)
            .map_err(|e| {
                error!("Failed to build download response: {}", e);
                AppError::Internal
            })
    }
}

#[derive(Clone)]
pub struct FileRouter {
    catalog: Arc<dyn Catalog>,
    nodes: NodeClient,
    lookup_timeout: Duration,
}

impl std::fmt::Debug for FileRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRouter")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl FileRouter {
    pub fn new(catalog: Arc<dyn Catalog>, nodes: NodeClient, lookup_timeout: Duration) -> Self {
        Self {
            catalog,
            nodes,
            lookup_timeout,
        }
    }

    pub fn nodes(&self) -> &NodeClient {
        &self.nodes
    }

    /// Catalog lookup bounded by the configured timeout. Every failure,
    /// including the timeout, reads as `NotFound`.
    pub async fn lookup(&self, file_id: Uuid) -> Result<FileNodeInfo, AppError> {
        match tokio::time::timeout(
            self.lookup_timeout,
            self.catalog.get_file_and_node_info(file_id),
        )
        .await
        {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(e)) => {
                debug!("Lookup of {} failed: {}", file_id, e);
                Err(AppError::NotFound)
            }
            Err(_) => {
                error!("Lookup of {} timed out", file_id);
                Err(AppError::NotFound)
            }
        }
    }

    /// One attempt, on the transport the node advertises. No fallback.
    pub async fn get_file(&self, caller: &Caller, raw_id: &str) -> Result<FileDownload, AppError> {
        let file_id = Uuid::parse_str(raw_id).map_err(|_| AppError::InvalidUuid)?;
        let info = self.lookup(file_id).await?;

        if let Caller::User(user) = caller {
            if user.sub != info.owner_id {
                warn!("User {} denied access to file {}", user.sub, file_id);
                return Err(AppError::Forbidden);
            }
        }

        let node = info.node();
        let (transport, body) = match node.tcp_port() {
            Some(_) => (Transport::Tcp, self.nodes.fetch_tcp(&node, file_id).await?),
            None => (Transport::Http, self.nodes.fetch_http(&node, file_id).await?),
        };

        info!(
            "Serving {} from node {} over {:?}",
            file_id, info.node_id, transport
        );
        Ok(FileDownload {
            info,
            transport,
            body,
        })
    }
}
