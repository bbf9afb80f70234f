use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};
use uuid::Uuid;

use crate::storage::FileStore;

/// Stream the stored file to `conn` until EOF. The caller closes the
/// connection afterwards; there is no length prefix or trailer.
pub async fn handle_read<W>(store: &FileStore, id: &Uuid, conn: &mut W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let (mut file, len) = store.open(id).await.inspect_err(|e| {
        error!("Registered file '{}' could not be opened: {}", id, e);
    })?;

    let copied = tokio::io::copy(&mut file, conn).await?;
    conn.flush().await?;

    if copied != len {
        info!("File {} changed while streaming ({} of {} bytes)", id, copied, len);
    }
    Ok(copied)
}

/// Store everything the peer sends until it closes its write side.
///
/// `head` holds bytes that arrived together with the handshake. Any error
/// while copying removes the partial file so no truncated upload is left
/// behind.
pub async fn handle_write<R>(
    store: &FileStore,
    id: &Uuid,
    head: Bytes,
    conn: &mut R,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut file = store.create(id).await.inspect_err(|e| {
        error!("Failed to create file '{}': {}", id, e);
    })?;

    let copied = async {
        file.write_all(&head).await?;
        let rest = tokio::io::copy(conn, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<u64, io::Error>(head.len() as u64 + rest)
    }
    .await;

    match copied {
        Ok(n) => Ok(n),
        Err(e) => {
            error!("Failed to write file '{}': {}", id, e);
            drop(file);
            if let Err(rm) = store.remove(id).await {
                error!("Failed to remove partial file '{}': {}", id, rm);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio_test::io::Builder;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn write_includes_head_bytes() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let mut conn = Builder::new().read(b" world").build();

        let n = handle_write(&store, &id, Bytes::from_static(b"hello"), &mut conn)
            .await
            .unwrap();
        assert_eq!(n, 11);

        let (mut f, _) = store.open(&id).await.unwrap();
        let mut s = String::new();
        f.read_to_string(&mut s).await.unwrap();
        assert_eq!(s, "hello world");
    }

    #[tokio::test]
    async fn interrupted_write_leaves_no_file() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let mut conn = Builder::new()
            .read(b"some bytes")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = handle_write(&store, &id, Bytes::new(), &mut conn)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(!store.exists(&id).await);
    }

    #[tokio::test]
    async fn read_streams_the_whole_file() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let data: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();
        std::fs::write(store.path_for(&id), &data).unwrap();

        let mut out = Vec::new();
        let n = handle_read(&store, &id, &mut out).await.unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn read_of_missing_file_fails() {
        let (_dir, store) = store();
        let mut out = Vec::new();
        let err = handle_read(&store, &Uuid::new_v4(), &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(out.is_empty());
    }
}
