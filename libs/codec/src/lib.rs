//! # Gavel Protocol Codec
//!
//! Encode/decode for the fixed-layout auction wire protocol. Every packet is
//! a one-byte type tag from a closed set followed by a fixed-size record;
//! the layouts live in [`messages`], construction in [`builder`], and
//! validation/decoding in [`parser`].
//!
//! This crate owns the protocol rules only. Socket management and connection
//! state belong to `gavel-network` and the server.

pub mod builder;
pub mod error;
pub mod messages;
pub mod parser;

pub use error::{CodecError, CodecResult};
pub use messages::{
    pack_str, unpack_str, Message, MessageType, ADDR_CAP, DESC_CAP, NAME_CAP, PORT_CAP, REASON_CAP,
};
pub use parser::decode;
