use std::io;
use std::time::Duration;

use bytes::Bytes;
use shared::SharedSecret;
use shared::transport::{DecodeError, IdenPayload, MAX_HANDSHAKE_LEN, decode_prefix};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("connection closed before a handshake arrived")]
    Empty,

    #[error("connection closed mid-handshake after {0} bytes")]
    Closed(usize),

    #[error("handshake does not fit in {MAX_HANDSHAKE_LEN} bytes")]
    Oversized,

    #[error("handshake timed out")]
    Timeout,

    #[error("malformed handshake: {0}")]
    Decode(#[from] DecodeError),

    #[error("file id is not a UUID")]
    InvalidId,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read until one full handshake is buffered, never more than
/// [`MAX_HANDSHAKE_LEN`] bytes.
///
/// Returns the payload and whatever arrived after it in the same reads; on a
/// write those bytes are the start of the file.
pub async fn read_handshake<R>(conn: &mut R) -> Result<(IdenPayload, Bytes), HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_HANDSHAKE_LEN];
    let mut filled = 0;

    loop {
        let n = conn.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                HandshakeError::Empty
            } else {
                HandshakeError::Closed(filled)
            });
        }
        filled += n;

        match decode_prefix(&buf[..filled]) {
            Ok((payload, used)) => {
                return Ok((payload, Bytes::copy_from_slice(&buf[used..filled])));
            }
            Err(DecodeError::Truncated) if filled < MAX_HANDSHAKE_LEN => continue,
            Err(DecodeError::Truncated) => return Err(HandshakeError::Oversized),
            Err(e) => return Err(e.into()),
        }
    }
}

/// [`read_handshake`] that gives up with [`HandshakeError::Timeout`] after
/// `limit`.
pub async fn read_handshake_within<R>(
    conn: &mut R,
    limit: Duration,
) -> Result<(IdenPayload, Bytes), HandshakeError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(limit, read_handshake(conn))
        .await
        .unwrap_or(Err(HandshakeError::Timeout))
}

/// Check the payload against the current secret and return the file id.
pub fn authenticate(payload: &IdenPayload, secret: &SharedSecret) -> Result<Uuid, HandshakeError> {
    let id = Uuid::parse_str(&payload.id).map_err(|_| HandshakeError::InvalidId)?;

    if !secret.verify(payload.random.as_bytes(), &payload.token) {
        return Err(HandshakeError::InvalidSignature);
    }

    Ok(id)
}
