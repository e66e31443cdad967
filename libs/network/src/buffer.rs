//! Pinned receive buffers.

use std::ops::{Deref, DerefMut};

use bytes::BytesMut;

use crate::MAX_PACKET_SIZE;

/// Fixed-size receive region pinned to at most one in-flight operation.
///
/// The buffer moves into the armed task and comes back inside the completion
/// event; re-arming hands the same allocation back, so each endpoint cycles
/// a single buffer for its lifetime.
#[derive(Debug)]
pub struct PacketBuffer {
    data: BytesMut,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::zeroed(MAX_PACKET_SIZE),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PacketBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[..]
    }
}

impl DerefMut for PacketBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}
