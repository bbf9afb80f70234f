pub mod keys;
pub mod password;
pub mod service;

pub use keys::{FileTokenKey, UserTokenKeys};
pub use password::{hash_password, verify_password};
pub use service::{CredentialService, IssuedToken, MAX_FILE_ACCESS_TTL, now_secs};
