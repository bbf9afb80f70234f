use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::body::{HttpResponse, full};
use crate::errors::AppError;

/// Serialize any `Serialize` type and deliver it as a JSON response.
pub fn deliver_serialized_json<T: Serialize>(data: &T, status: StatusCode) -> Result<HttpResponse> {
    let json = serde_json::to_string(data).context("Failed to serialize response")?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Deliver `err` as `{"status":"error","code":..,"error":..}` with its status.
///
/// Built without the response builder so there is nothing left to fail.
pub fn deliver_error_json(err: &AppError) -> HttpResponse {
    let status = err.status();
    if status.is_server_error() {
        error!("Delivering error JSON: {} - {} ({})", status.as_u16(), err.code(), err);
    } else {
        warn!("Delivering error JSON: {} - {} ({})", status.as_u16(), err.code(), err);
    }

    let body = serde_json::to_vec(&err.to_body()).map(Bytes::from).unwrap_or_else(|_| {
        Bytes::from_static(br#"{"status":"error","code":5000,"error":"Internal server error"}"#)
    });

    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
