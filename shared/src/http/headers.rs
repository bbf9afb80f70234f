use std::collections::HashMap;

use hyper::header::HeaderMap;
use tracing::debug;

use crate::errors::AppError;

/// Split `Authorization: <scheme> <credentials>`.
///
/// `Ok(None)` when the header is absent; `InvalidAuthHeader` when it is
/// present but not two space-separated parts.
pub fn get_authorization(headers: &HeaderMap) -> Result<Option<(String, String)>, AppError> {
    let Some(raw) = headers.get(hyper::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = raw.to_str().map_err(|_| AppError::InvalidAuthHeader)?;
    let mut parts = value.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(credentials), None) if !scheme.is_empty() && !credentials.is_empty() => {
            Ok(Some((scheme.to_string(), credentials.to_string())))
        }
        _ => Err(AppError::InvalidAuthHeader),
    }
}

/// `Authorization: Bearer <token>`. A header with any other scheme is an error.
pub fn get_bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    match get_authorization(headers)? {
        Some((scheme, token)) if scheme == "Bearer" => {
            debug!("Bearer token extracted");
            Ok(Some(token))
        }
        Some(_) => Err(AppError::InvalidAuthHeader),
        None => Ok(None),
    }
}

/// `Authorization: Signature <hex>` as sent by the proxy to a node.
pub fn get_signature(headers: &HeaderMap) -> Result<String, AppError> {
    match get_authorization(headers)? {
        Some((scheme, sig)) if scheme == "Signature" => Ok(sig),
        Some(_) => Err(AppError::InvalidAuthHeader),
        None => Err(AppError::Unauthorized),
    }
}

/// Decoded query string; later duplicates win.
pub fn query_params(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{AUTHORIZATION, HeaderValue};

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        let headers = with_auth("Bearer abc.def.ghi");
        assert_eq!(
            get_bearer_token(&headers).unwrap(),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(get_bearer_token(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn wrong_scheme_is_invalid_header() {
        let headers = with_auth("Basic dXNlcjpwYXNz");
        assert!(matches!(
            get_bearer_token(&headers),
            Err(AppError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for value in ["Bearer", "Bearer a b", "Bearer ", " token"] {
            let headers = with_auth(value);
            assert!(
                matches!(get_authorization(&headers), Err(AppError::InvalidAuthHeader)),
                "{value:?}"
            );
        }
    }

    #[test]
    fn signature_header_is_extracted() {
        let headers = with_auth("Signature deadbeef");
        assert_eq!(get_signature(&headers).unwrap(), "deadbeef");
        assert!(matches!(
            get_signature(&HeaderMap::new()),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn query_params_are_decoded() {
        let params = query_params(Some("rnd=ab%20cd&access_token=x.y.z"));
        assert_eq!(params["rnd"], "ab cd");
        assert_eq!(params["access_token"], "x.y.z");
        assert!(query_params(None).is_empty());
    }
}
