//! # Gavel Network Infrastructure
//!
//! Socket endpoints and completion plumbing for the auction server. The
//! model mirrors overlapped I/O: every receive is armed one at a time
//! against a pinned [`PacketBuffer`], finishes as an event on a
//! [`CompletionQueue`], and is re-armed by the consuming service loop.
//! Shutdown cancels in-flight operations and posts a sentinel onto each
//! queue to drain the loops.
//!
//! Protocol rules live in `gavel-codec`; connection and auction state
//! belong to the server.

pub mod buffer;
pub mod completion;
pub mod error;
pub mod tasks;
pub mod tcp;
pub mod udp;

pub use buffer::PacketBuffer;
pub use completion::{completion_queue, Completion, CompletionQueue, CompletionReceiver};
pub use error::{Result, TransportError};
pub use tasks::{spawn_after, TimerHandle};
pub use tcp::{arm_stream_read, attach_stream, AcceptEvent, StreamHandle, StreamListener, StreamReadEvent};
pub use udp::{DatagramEndpoint, DatagramEvent};

/// Largest packet either transport carries; receive buffers are this size.
pub const MAX_PACKET_SIZE: usize = 512;
