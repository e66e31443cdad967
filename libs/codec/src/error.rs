//! Codec error types.

use thiserror::Error;

/// Packet decoding errors.
///
/// Encoding is infallible for valid inputs (overlong strings truncate), so
/// only the decode path produces errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Packet is shorter than the record its tag declares.
    #[error("packet too small: need {need} bytes, got {got} ({context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// Leading type tag is outside the closed tag set.
    #[error("unknown message tag {tag:#04x}")]
    UnknownTag { tag: u8 },
}

impl CodecError {
    pub fn message_too_small(need: usize, got: usize, context: &'static str) -> Self {
        Self::MessageTooSmall { need, got, context }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
