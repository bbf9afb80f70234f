pub mod catalog;
pub mod json_error;
pub mod jwt;
pub mod login;
pub mod settings;

pub use self::catalog::{FileNodeInfo, NewFile, NewUser, NodeInfo, UserCredential};
pub use self::json_error::{DataResponse, ErrorResponse};
pub use self::jwt::{
    FileAccessJwtPayload, FilePermission, ShareRequest, ShareResponse, UserJwtPayload, UserRole,
};
pub use self::login::{SignInBody, SignUpBody, SignUpError, UserView};
pub use self::settings::{ConfigError, NodeConfig, ProxyConfig, TlsConfig};
