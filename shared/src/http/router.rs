use std::future::Future;
use std::pin::Pin;

use hyper::body::Incoming;
use hyper::{Method, Request};
use tracing::debug;

use super::body::HttpResponse;
use super::json_response::deliver_error_json;
use crate::errors::AppError;

// ---------------------------------------------------------------------------
// Handler type
// ---------------------------------------------------------------------------
//
// Handlers receive the request, a clone of the service state and the `:param`
// segments matched from the route path. They return `AppError` for anything
// the caller should see as a JSON error; the router renders it.

pub type HandlerResult = Result<HttpResponse, AppError>;

type RouteHandler<S, B> = Box<
    dyn Fn(Request<B>, S, PathParams) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
        + Send
        + Sync,
>;

/// `:name` segments captured while matching a route.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

struct Route<S, B> {
    method: Method,
    path: String,
    handler: RouteHandler<S, B>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router<S, B = Incoming> {
    routes: Vec<Route<S, B>>,
}

impl<S, B> std::fmt::Debug for Router<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl<S, B> Default for Router<S, B>
where
    S: Clone + Send + Sync + 'static,
    B: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Router<S, B>
where
    S: Clone + Send + Sync + 'static,
    B: Send + 'static,
{
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn add<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<B>, S, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(move |req, state, params| Box::pin(handler(req, state, params))),
        });
        self
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<B>, S, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<B>, S, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(&self, req: Request<B>, state: S) -> HttpResponse {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method {
                continue;
            }
            let Some(params) = Self::path_matches(&route.path, &path) else {
                continue;
            };

            debug!("{} {} matched {}", method, path, route.path);
            return match (route.handler)(req, state, params).await {
                Ok(response) => response,
                Err(err) => deliver_error_json(&err),
            };
        }

        debug!("No route for {} {}", method, path);
        deliver_error_json(&AppError::NotFound)
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    /// Match segment by segment; `:name` captures one non-empty segment.
    pub fn path_matches(route_path: &str, request_path: &str) -> Option<PathParams> {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return None;
        }

        let mut params = Vec::new();
        for (r, p) in route_segs.iter().zip(path_segs.iter()) {
            if let Some(name) = r.strip_prefix(':') {
                if p.is_empty() {
                    return None;
                }
                params.push((name.to_string(), p.to_string()));
            } else if r != p {
                return None;
            }
        }

        Some(PathParams(params))
    }
}
