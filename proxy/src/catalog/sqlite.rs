use std::str::FromStr;

use async_trait::async_trait;
use shared::types::{FileNodeInfo, NewFile, NewUser, NodeInfo, UserCredential, UserRole, UserView};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{Catalog, CatalogError};
use crate::auth::now_secs;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id            TEXT    PRIMARY KEY,
        first_name    TEXT    NOT NULL,
        last_name     TEXT    NOT NULL,
        email         TEXT    NOT NULL UNIQUE,
        password_hash TEXT    NOT NULL,
        role          TEXT    NOT NULL DEFAULT 'USER',
        created_at    INTEGER NOT NULL,
        deleted_at    INTEGER
    )",
    // tcp_port NULL means the node only serves HTTP
    "CREATE TABLE IF NOT EXISTS nodes (
        id        TEXT    PRIMARY KEY,
        address   TEXT    NOT NULL,
        http_port INTEGER NOT NULL,
        tcp_port  INTEGER,
        tls       INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS files (
        id           TEXT    PRIMARY KEY,
        owner_id     TEXT    NOT NULL,
        node_id      TEXT    NOT NULL,
        name         TEXT    NOT NULL,
        content_type TEXT    NOT NULL,
        checksum     TEXT    NOT NULL,
        created_at   INTEGER NOT NULL,
        FOREIGN KEY (owner_id) REFERENCES users(id),
        FOREIGN KEY (node_id)  REFERENCES nodes(id)
    )",
];

/// SQLite-backed [`Catalog`]. UUIDs are stored as hyphenated text.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the database at `url` and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        info!("Catalog ready at {}", url);
        Ok(catalog)
    }

    /// Private in-memory database. One connection that never expires, so the
    /// data lives as long as the pool.
    pub async fn in_memory() -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        Ok(catalog)
    }

    pub async fn migrate(&self) -> Result<(), CatalogError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Catalog schema up to date");
        Ok(())
    }

    /// Insert a node, or update its address and ports if the id exists.
    pub async fn register_node(&self, node: &NodeInfo) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO nodes (id, address, http_port, tcp_port, tls)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                address   = excluded.address,
                http_port = excluded.http_port,
                tcp_port  = excluded.tcp_port,
                tls       = excluded.tls",
        )
        .bind(node.id.to_string())
        .bind(&node.address)
        .bind(i64::from(node.http_port))
        .bind(node.tcp_port.map(i64::from))
        .bind(node.tls)
        .execute(&self.pool)
        .await?;

        info!("Registered node {} at {}", node.id, node.address);
        Ok(())
    }

    /// `NotFound` when the owner or node does not exist.
    pub async fn register_file(&self, file: &NewFile) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO files (id, owner_id, node_id, name, content_type, checksum, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(file.id.to_string())
        .bind(file.owner_id.to_string())
        .bind(file.node_id.to_string())
        .bind(&file.name)
        .bind(&file.content_type)
        .bind(&file.checksum)
        .bind(now_secs() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                CatalogError::NotFound
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => CatalogError::Duplicate,
            other => CatalogError::Database(other),
        })?;

        debug!("Registered file {} on node {}", file.id, file.node_id);
        Ok(())
    }

    /// Soft delete. The account can no longer sign in.
    pub async fn mark_user_deleted(&self, user_id: Uuid) -> Result<(), CatalogError> {
        let result = sqlx::query("UPDATE users SET deleted_at = ?1 WHERE id = ?2")
            .bind(now_secs() as i64)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn get_file_and_node_info(&self, file_id: Uuid) -> Result<FileNodeInfo, CatalogError> {
        let row = sqlx::query(
            "SELECT f.id AS file_id, f.owner_id, f.checksum, f.content_type, f.name,
                    n.id AS node_id, n.address, n.http_port, n.tcp_port, n.tls
             FROM files f
             JOIN nodes n ON n.id = f.node_id
             WHERE f.id = ?1",
        )
        .bind(file_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("File lookup for {} failed: {}", file_id, e);
            CatalogError::Database(e)
        })?
        .ok_or(CatalogError::NotFound)?;

        Ok(FileNodeInfo {
            file_id: uuid_column(&row, "file_id")?,
            owner_id: uuid_column(&row, "owner_id")?,
            checksum: row.try_get("checksum")?,
            content_type: row.try_get("content_type")?,
            name: row.try_get("name")?,
            node_id: uuid_column(&row, "node_id")?,
            node_address: row.try_get("address")?,
            http_port: port(row.try_get("http_port")?)?,
            tcp_port: row
                .try_get::<Option<i64>, _>("tcp_port")?
                .map(port)
                .transpose()?,
            tls: row.try_get("tls")?,
        })
    }

    async fn get_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredential>, CatalogError> {
        let Some(row) = sqlx::query(
            "SELECT id, email, password_hash, role, deleted_at FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(UserCredential {
            id: uuid_column(&row, "id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: UserRole::parse(&role)
                .ok_or_else(|| CatalogError::Corrupt(format!("unknown role `{}`", role)))?,
            deleted: row.try_get::<Option<i64>, _>("deleted_at")?.is_some(),
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<UserView, CatalogError> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id.to_string())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now_secs() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => CatalogError::Duplicate,
            other => CatalogError::Database(other),
        })?;

        info!("Created user {}", id);
        Ok(UserView {
            id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        })
    }

    async fn get_node(&self, node_id: Uuid) -> Result<NodeInfo, CatalogError> {
        let row = sqlx::query("SELECT id, address, http_port, tcp_port, tls FROM nodes WHERE id = ?1")
            .bind(node_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CatalogError::NotFound)?;

        Ok(NodeInfo {
            id: uuid_column(&row, "id")?,
            address: row.try_get("address")?,
            http_port: port(row.try_get("http_port")?)?,
            tcp_port: row
                .try_get::<Option<i64>, _>("tcp_port")?
                .map(port)
                .transpose()?,
            tls: row.try_get("tls")?,
        })
    }
}

fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid, CatalogError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|_| CatalogError::Corrupt(format!("`{}` is not a UUID: {}", column, raw)))
}

fn port(value: i64) -> Result<u16, CatalogError> {
    u16::try_from(value).map_err(|_| CatalogError::Corrupt(format!("port out of range: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password_hash: "$argon2id$placeholder".into(),
            role: UserRole::User,
        }
    }

    fn node(tcp_port: Option<u16>) -> NodeInfo {
        NodeInfo {
            id: Uuid::new_v4(),
            address: "127.0.0.1".into(),
            http_port: 8081,
            tcp_port,
            tls: false,
        }
    }

    #[tokio::test]
    async fn users_roundtrip_and_emails_are_unique() {
        let catalog = SqliteCatalog::in_memory().await.unwrap();
        let view = catalog.create_user(new_user("ada@example.com")).await.unwrap();

        let cred = catalog
            .get_credential_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.id, view.id);
        assert_eq!(cred.role, UserRole::User);
        assert!(!cred.deleted);

        assert!(matches!(
            catalog.create_user(new_user("ada@example.com")).await,
            Err(CatalogError::Duplicate)
        ));
        assert!(
            catalog
                .get_credential_by_email("nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn deleted_users_are_flagged() {
        let catalog = SqliteCatalog::in_memory().await.unwrap();
        let view = catalog.create_user(new_user("gone@example.com")).await.unwrap();
        catalog.mark_user_deleted(view.id).await.unwrap();

        let cred = catalog
            .get_credential_by_email("gone@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(cred.deleted);
        assert!(matches!(
            catalog.mark_user_deleted(Uuid::new_v4()).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn files_join_their_node() {
        let catalog = SqliteCatalog::in_memory().await.unwrap();
        let owner = catalog.create_user(new_user("o@example.com")).await.unwrap();
        let node = node(None);
        catalog.register_node(&node).await.unwrap();

        let file = NewFile {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            node_id: node.id,
            name: "report.pdf".into(),
            content_type: "application/pdf".into(),
            checksum: "abc".into(),
        };
        catalog.register_file(&file).await.unwrap();

        let info = catalog.get_file_and_node_info(file.id).await.unwrap();
        assert_eq!(info.owner_id, owner.id);
        assert_eq!(info.node_id, node.id);
        assert_eq!(info.http_port, 8081);
        assert_eq!(info.tcp_port(), None);
        assert_eq!(info.node(), node);
    }

    #[tokio::test]
    async fn reregistering_a_node_updates_it() {
        let catalog = SqliteCatalog::in_memory().await.unwrap();
        let mut node = node(None);
        catalog.register_node(&node).await.unwrap();

        node.tcp_port = Some(2022);
        node.tls = true;
        catalog.register_node(&node).await.unwrap();
        assert_eq!(catalog.get_node(node.id).await.unwrap(), node);
    }

    #[tokio::test]
    async fn unknown_rows_are_not_found() {
        let catalog = SqliteCatalog::in_memory().await.unwrap();
        assert!(matches!(
            catalog.get_file_and_node_info(Uuid::new_v4()).await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            catalog.get_node(Uuid::new_v4()).await,
            Err(CatalogError::NotFound)
        ));

        let orphan = NewFile {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            node_id: Uuid::new_v4(),
            name: "x".into(),
            content_type: "text/plain".into(),
            checksum: "0".into(),
        };
        assert!(matches!(
            catalog.register_file(&orphan).await,
            Err(CatalogError::NotFound)
        ));
    }
}
