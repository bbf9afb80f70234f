pub mod sqlite;

use async_trait::async_trait;
use shared::types::{FileNodeInfo, NewUser, NodeInfo, UserCredential, UserView};
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::SqliteCatalog;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    Duplicate,

    #[error("Corrupt catalog row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The relational catalog of users, nodes and files.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// A file joined with the node that stores it.
    async fn get_file_and_node_info(&self, file_id: Uuid) -> Result<FileNodeInfo, CatalogError>;

    /// `Ok(None)` when no account uses `email`. Deleted accounts are returned
    /// with `deleted` set.
    async fn get_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredential>, CatalogError>;

    /// Insert a user; `Duplicate` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserView, CatalogError>;

    async fn get_node(&self, node_id: Uuid) -> Result<NodeInfo, CatalogError>;
}
