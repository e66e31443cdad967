//! Datagram endpoint.
//!
//! A bound UDP socket with one armed receive at a time. Arming posts a
//! single `recv_from` whose result comes back through the completion queue
//! together with the buffer; the consumer re-arms after handling. Sends are
//! synchronous best-effort: a failed send is logged and the packet dropped.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::buffer::PacketBuffer;
use crate::completion::CompletionQueue;
use crate::error::{Result, TransportError};

/// Completion payload for an armed datagram receive.
///
/// A receive cancelled at shutdown completes with `ErrorKind::Interrupted`.
#[derive(Debug)]
pub struct DatagramEvent {
    pub buffer: PacketBuffer,
    pub result: io::Result<(usize, SocketAddr)>,
}

/// Bound datagram socket.
pub struct DatagramEndpoint {
    socket: Arc<UdpSocket>,
    shutdown: CancellationToken,
}

impl DatagramEndpoint {
    pub async fn bind(addr: SocketAddr, shutdown: CancellationToken) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            TransportError::network_with_source(
                format!("failed to bind datagram socket on {addr}"),
                e,
            )
        })?;
        Ok(Self {
            socket: Arc::new(socket),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::network_with_source("failed to get local address", e))
    }

    /// Posts exactly one receive against `buffer`.
    ///
    /// The completion carries the buffer back so the caller can re-arm with
    /// the same allocation, keeping at most one receive outstanding.
    pub fn arm_receive(&self, mut buffer: PacketBuffer, completions: &CompletionQueue<DatagramEvent>) {
        let socket = Arc::clone(&self.socket);
        let shutdown = self.shutdown.clone();
        let completions = completions.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = shutdown.cancelled() => {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "receive aborted"))
                }
                result = socket.recv_from(buffer.as_mut_slice()) => result,
            };
            completions.post(DatagramEvent { buffer, result });
        });
    }

    /// Best-effort send to `addr`.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) {
        match self.socket.send_to(data, addr).await {
            Ok(bytes) => debug!(peer = %addr, bytes, "sent datagram"),
            Err(e) => warn!(peer = %addr, "failed to send datagram: {e}"),
        }
    }
}
