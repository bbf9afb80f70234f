use std::io;

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::Response;
use hyper::body::{Body, Frame};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::errors::AppError;

/// Read size for streamed file bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Cap on JSON request bodies.
pub const MAX_JSON_BODY: usize = 64 * 1024;

/// Every response body in the workspace. An `Err` frame aborts the
/// connection, which is how a mid-stream failure reaches the client.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;
pub type HttpResponse = Response<ResponseBody>;

pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Stream `reader` as a body until EOF.
pub fn reader_body<R>(mut reader: R) -> ResponseBody
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let chunks = stream! {
        loop {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => yield Ok(buf.freeze()),
                Err(e) => {
                    warn!("Body stream aborted: {}", e);
                    yield Err(e);
                    break;
                }
            }
        }
    };

    StreamBody::new(chunks.map(|r| r.map(Frame::data))).boxed_unsync()
}

/// Re-box an upstream body so its errors surface as `io::Error`.
pub fn proxied_body<B>(body: B) -> ResponseBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    body.map_err(io::Error::other).boxed_unsync()
}

/// Collect a JSON request body, bounded by [`MAX_JSON_BODY`].
pub async fn read_json<T, B>(body: B) -> Result<T, AppError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limited = http_body_util::Limited::new(body, MAX_JSON_BODY);
    let bytes = limited
        .collect()
        .await
        .map_err(|e| {
            debug!("Failed to read request body: {}", e);
            AppError::BadRequest("Request body is too large or unreadable".into())
        })?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Probe {
        name: String,
    }

    #[tokio::test]
    async fn reader_body_yields_all_bytes() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 17];
        let body = reader_body(std::io::Cursor::new(data.clone()));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn reader_errors_become_body_errors() {
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let body = reader_body(reader);
        assert!(body.collect().await.is_err());
    }

    #[tokio::test]
    async fn json_bodies_parse() {
        let probe: Probe = read_json(Full::new(Bytes::from(r#"{"name":"a"}"#)))
            .await
            .unwrap();
        assert_eq!(probe.name, "a");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let err = read_json::<Probe, _>(Full::new(Bytes::from("{")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn oversized_json_is_rejected() {
        let big = format!(r#"{{"name":"{}"}}"#, "x".repeat(MAX_JSON_BODY));
        let err = read_json::<Probe, _>(Full::new(Bytes::from(big)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
