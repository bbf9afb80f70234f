//! Raw TCP handshake exchanged once at the start of every node connection.
//!
//! There is no magic byte, no version byte and no response frame: the first
//! bytes a node reads are an encoded [`IdenPayload`], and the only error signal
//! the node ever sends back is closing the connection.

pub mod iden;

pub use iden::{
    DecodeError, EncodeError, IdenPayload, MAX_HANDSHAKE_LEN, RequestType, decode, decode_prefix,
};
