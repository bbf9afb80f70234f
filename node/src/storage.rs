use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tracing::{debug, info};
use uuid::Uuid;

/// Flat directory of files named by their UUID.
///
/// Ids are parsed `Uuid`s before they reach this type, so the on-disk name is
/// always the canonical hyphenated form and can never escape `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!("Data directory ready at {}", self.root.display());
        Ok(())
    }

    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.root.join(id.hyphenated().to_string())
    }

    /// Open a stored file for reading, along with its length.
    pub async fn open(&self, id: &Uuid) -> io::Result<(File, u64)> {
        let file = File::open(self.path_for(id)).await?;
        let len = file.metadata().await?.len();
        debug!("Opened {} ({} bytes)", id, len);
        Ok((file, len))
    }

    /// Create (or truncate) the file for `id`.
    pub async fn create(&self, id: &Uuid) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path_for(id))
            .await
    }

    pub async fn remove(&self, id: &Uuid) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    pub async fn exists(&self, id: &Uuid) -> bool {
        fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn create_open_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = Uuid::new_v4();

        assert!(!store.exists(&id).await);

        let mut f = store.create(&id).await.unwrap();
        f.write_all(b"hello").await.unwrap();
        f.flush().await.unwrap();
        drop(f);

        let (mut f, len) = store.open(&id).await.unwrap();
        assert_eq!(len, 5);
        let mut buf = String::new();
        f.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "hello");

        store.remove(&id).await.unwrap();
        assert!(!store.exists(&id).await);
        // removing twice is fine
        store.remove(&id).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store.open(&Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn ensure_root_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("a/b/c"));
        store.ensure_root().await.unwrap();
        assert!(store.root().is_dir());
    }
}
