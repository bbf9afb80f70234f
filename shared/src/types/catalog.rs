use uuid::Uuid;

use super::jwt::UserRole;

// ---------------------------------------------------------------------------
// Rows read back from the catalog
// ---------------------------------------------------------------------------

/// A file joined with the node that stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNodeInfo {
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub checksum: String,
    pub content_type: String,
    pub name: String,
    pub node_id: Uuid,
    pub node_address: String,
    pub http_port: u16,
    /// `None` (or 0) means the node only speaks HTTP.
    pub tcp_port: Option<u16>,
    pub tls: bool,
}

impl FileNodeInfo {
    /// The TCP port, if the node advertises a usable one.
    pub fn tcp_port(&self) -> Option<u16> {
        self.tcp_port.filter(|p| *p != 0)
    }

    pub fn node(&self) -> NodeInfo {
        NodeInfo {
            id: self.node_id,
            address: self.node_address.clone(),
            http_port: self.http_port,
            tcp_port: self.tcp_port,
            tls: self.tls,
        }
    }
}

/// Minimal data needed to verify a user's credentials.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Inserts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// A storage node as registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: Uuid,
    pub address: String,
    pub http_port: u16,
    pub tcp_port: Option<u16>,
    pub tls: bool,
}

impl NodeInfo {
    pub fn tcp_port(&self) -> Option<u16> {
        self.tcp_port.filter(|p| *p != 0)
    }

    /// `host:port` for dialing.
    pub fn authority(&self, port: u16) -> String {
        format!("{}:{}", self.address, port)
    }
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub node_id: Uuid,
    pub name: String,
    pub content_type: String,
    pub checksum: String,
}
