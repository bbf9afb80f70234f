use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "USER" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bit flags carried in a file-access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePermission(pub u8);

impl FilePermission {
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
    pub const READ_WRITE: Self = Self(3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Only the two defined bits may be set, and at least one of them.
    pub fn is_valid(self) -> bool {
        self.0 != 0 && self.0 & !Self::READ_WRITE.0 == 0
    }
}

/// Claims of a user session token (EdDSA).
///
/// `iat` and `exp` are unix seconds. The token is stateless: it stays valid
/// until `exp` no matter what happens to the account afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJwtPayload {
    pub sub: Uuid,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
    pub role: UserRole,
}

/// Claims of a short-lived grant for a single file (HS256).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAccessJwtPayload {
    /// The file this grant is for.
    pub sub: Uuid,
    pub iat: u64,
    pub exp: u64,
    pub perm: FilePermission,
}

/// Body of `POST /files/{id}/share`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareRequest {
    #[serde(default = "default_share_perm")]
    pub perm: FilePermission,
    #[serde(default = "default_share_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    pub token: String,
    pub expires_at: u64,
}

pub fn default_share_perm() -> FilePermission {
    FilePermission::READ
}

pub fn default_share_ttl() -> u64 {
    300
}
