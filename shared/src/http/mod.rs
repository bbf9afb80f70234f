pub mod body;
pub mod headers;
pub mod json_response;
pub mod router;
pub mod server;

pub use body::{HttpResponse, ResponseBody, full, proxied_body, read_json, reader_body};
pub use headers::{get_bearer_token, get_signature, query_params};
pub use json_response::{deliver_error_json, deliver_serialized_json};
pub use router::{HandlerResult, PathParams, Router};
pub use server::serve_http;
