use hyper::StatusCode;
use thiserror::Error;

use crate::transport::DecodeError;
use crate::types::ErrorResponse;

/// Every failure an HTTP handler can report to a caller.
///
/// Each variant maps to a fixed status and a stable numeric code so clients
/// can branch on `code` without parsing `error`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed request: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid authorization header")]
    InvalidAuthHeader,

    #[error("Route requires authentication")]
    Unauthorized,

    #[error("Invalid email or password")]
    AuthFailed,

    #[error("Access to this file is denied")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Invalid UUID")]
    InvalidUuid,

    #[error("Missing rnd parameter")]
    MissingNonce,

    #[error("{0}")]
    BadRequest(String),

    #[error("Signup is not allowed")]
    SignupDisabled,

    #[error("Resource already exists")]
    Conflict,

    #[error("Storage node unavailable")]
    UpstreamUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::InvalidUuid | Self::MissingNonce | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidSignature
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::InvalidAuthHeader
            | Self::Unauthorized
            | Self::AuthFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::SignupDisabled => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Decode(_) => 4001,
            Self::MissingNonce => 4006,
            Self::BadRequest(_) => 4000,
            Self::InvalidUuid => 40011,
            Self::AuthFailed => 4011,
            Self::Unauthorized => 4012,
            Self::ExpiredToken => 4013,
            Self::InvalidToken => 4014,
            Self::InvalidAuthHeader => 4015,
            Self::InvalidSignature => 4017,
            Self::Forbidden => 4016,
            Self::SignupDisabled => 4031,
            Self::NotFound => 4042,
            Self::Conflict => 4091,
            Self::UpstreamUnavailable => 5021,
            Self::Internal => 5000,
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_401() {
        for err in [
            AppError::InvalidSignature,
            AppError::InvalidToken,
            AppError::ExpiredToken,
            AppError::InvalidAuthHeader,
            AppError::Unauthorized,
            AppError::AuthFailed,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "{:?}", err);
        }
    }

    #[test]
    fn forbidden_is_distinct_from_unauthorized() {
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_ne!(AppError::Forbidden.code(), AppError::Unauthorized.code());
    }

    #[test]
    fn body_carries_code_and_message() {
        let body = AppError::MissingNonce.to_body();
        assert_eq!(body.status, "error");
        assert_eq!(body.code, 4006);
        assert_eq!(body.error, "Missing rnd parameter");
    }

    #[test]
    fn decode_errors_convert() {
        let err: AppError = DecodeError::Truncated.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("truncated"));
    }
}
