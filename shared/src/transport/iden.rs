use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Upper bound on an encoded handshake. Nodes never read more than this
/// before the payload is decoded and its signature checked.
pub const MAX_HANDSHAKE_LEN: usize = 1024;

const TAG_ID: u8 = 0x01;
const TAG_RANDOM: u8 = 0x02;
const TAG_TOKEN: u8 = 0x03;
const TAG_TYPE: u8 = 0x04;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("handshake is truncated")]
    Truncated,

    #[error("expected field tag {expected:#04x}, found {found:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("field `{0}` is not valid utf-8")]
    InvalidUtf8(&'static str),

    #[error("unknown request type {0}")]
    InvalidType(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("field `{0}` is longer than 65535 bytes")]
    FieldTooLong(&'static str),

    #[error("handshake of {0} bytes exceeds the 1024 byte limit")]
    TooLarge(usize),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// What the proxy wants done with the file named in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Read = 1,
    Write = 2,
}

impl TryFrom<u8> for RequestType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            other => Err(DecodeError::InvalidType(other)),
        }
    }
}

/// Identification message sent as the first bytes of a node TCP connection.
///
/// `token` must equal `hex(sha256(random || shared_secret))`; the node checks
/// that before touching the file named by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdenPayload {
    pub id: String,
    pub random: String,
    pub token: String,
    pub kind: RequestType,
}

impl IdenPayload {
    /// Encode as `tag | u16 length | utf-8` for the three string fields
    /// followed by `tag | u8` for the request type.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let fields = [
            (TAG_ID, "id", &self.id),
            (TAG_RANDOM, "random", &self.random),
            (TAG_TOKEN, "token", &self.token),
        ];

        for (_, name, value) in &fields {
            if value.len() > u16::MAX as usize {
                return Err(EncodeError::FieldTooLong(*name));
            }
        }

        let len = self.encoded_len();
        if len > MAX_HANDSHAKE_LEN {
            return Err(EncodeError::TooLarge(len));
        }

        let mut buf = BytesMut::with_capacity(len);
        for (tag, _, value) in fields {
            buf.put_u8(tag);
            buf.put_u16(value.len() as u16);
            buf.put_slice(value.as_bytes());
        }
        buf.put_u8(TAG_TYPE);
        buf.put_u8(self.kind as u8);

        Ok(buf.freeze())
    }

    pub fn encoded_len(&self) -> usize {
        3 * 3 + self.id.len() + self.random.len() + self.token.len() + 2
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a handshake from the start of `input`, ignoring trailing bytes.
pub fn decode(input: &[u8]) -> Result<IdenPayload, DecodeError> {
    decode_prefix(input).map(|(payload, _)| payload)
}

/// Decode a handshake and report how many bytes of `input` it occupied.
///
/// `input` is untrusted: every embedded length is checked against the bytes
/// actually present before anything is copied out of it.
pub fn decode_prefix(input: &[u8]) -> Result<(IdenPayload, usize), DecodeError> {
    let mut cur = input;

    let id = take_str(&mut cur, TAG_ID, "id")?;
    let random = take_str(&mut cur, TAG_RANDOM, "random")?;
    let token = take_str(&mut cur, TAG_TOKEN, "token")?;

    expect_tag(&mut cur, TAG_TYPE)?;
    if !cur.has_remaining() {
        return Err(DecodeError::Truncated);
    }
    let kind = RequestType::try_from(cur.get_u8())?;

    let consumed = input.len() - cur.remaining();
    Ok((
        IdenPayload {
            id,
            random,
            token,
            kind,
        },
        consumed,
    ))
}

fn expect_tag(cur: &mut &[u8], expected: u8) -> Result<(), DecodeError> {
    if !cur.has_remaining() {
        return Err(DecodeError::Truncated);
    }
    let found = cur.get_u8();
    if found != expected {
        return Err(DecodeError::UnexpectedTag { expected, found });
    }
    Ok(())
}

fn take_str(cur: &mut &[u8], tag: u8, field: &'static str) -> Result<String, DecodeError> {
    expect_tag(cur, tag)?;

    if cur.remaining() < 2 {
        return Err(DecodeError::Truncated);
    }
    let len = cur.get_u16() as usize;
    if cur.remaining() < len {
        return Err(DecodeError::Truncated);
    }

    let value = std::str::from_utf8(&cur[..len])
        .map_err(|_| DecodeError::InvalidUtf8(field))?
        .to_owned();
    cur.advance(len);

    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
