pub mod config;
pub mod errors;
pub mod http;
pub mod net;
pub mod signature;
pub mod tls;
pub mod transport;
pub mod types;

pub use errors::AppError;
pub use signature::SharedSecret;
pub use transport::{IdenPayload, RequestType};
