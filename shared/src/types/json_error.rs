use serde::{Deserialize, Serialize};

/// Standard error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: u32,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: u32, error: &str) -> Self {
        Self {
            status: "error".to_string(),
            code,
            error: error.to_string(),
        }
    }
}

/// `{ "data": ..., "message": ... }` envelope used by the auth endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
    pub message: String,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: "Success".to_string(),
        }
    }
}
