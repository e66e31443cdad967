//! Stream listener and per-connection stream plumbing.
//!
//! The listener keeps one accept armed; accepted sockets are split into an
//! owned read half (cycled through armed reads keyed by the connection) and
//! a [`StreamHandle`] write half the server sends through. Dropping the
//! handle half-closes the stream, which is how a connection stops sending.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::PacketBuffer;
use crate::completion::CompletionQueue;
use crate::error::{Result, TransportError};

/// Completion payload for an armed accept.
#[derive(Debug)]
pub struct AcceptEvent {
    pub result: io::Result<(TcpStream, SocketAddr)>,
}

/// Completion payload for an armed per-connection read.
///
/// The read half and buffer come back with the event so the handler can
/// re-arm them; dropping them instead finishes tearing the stream down.
#[derive(Debug)]
pub struct StreamReadEvent {
    pub key: String,
    pub read_half: OwnedReadHalf,
    pub buffer: PacketBuffer,
    pub result: io::Result<usize>,
}

/// Bound, listening stream socket.
pub struct StreamListener {
    listener: Arc<TcpListener>,
    shutdown: CancellationToken,
}

impl StreamListener {
    pub async fn bind(addr: SocketAddr, shutdown: CancellationToken) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            TransportError::network_with_source(
                format!("failed to bind stream listener on {addr}"),
                e,
            )
        })?;
        Ok(Self {
            listener: Arc::new(listener),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::network_with_source("failed to get local address", e))
    }

    /// Schedules one accept; the completion delivers the connected socket
    /// with its peer address. The handler configures the socket, attaches
    /// it, then arms the next accept.
    pub fn arm_accept(&self, completions: &CompletionQueue<AcceptEvent>) {
        let listener = Arc::clone(&self.listener);
        let shutdown = self.shutdown.clone();
        let completions = completions.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = shutdown.cancelled() => {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "accept aborted"))
                }
                result = listener.accept() => result,
            };
            completions.post(AcceptEvent { result });
        });
    }
}

/// Write side of an attached client stream.
#[derive(Debug)]
pub struct StreamHandle {
    write_half: OwnedWriteHalf,
    peer: SocketAddr,
}

impl StreamHandle {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes one whole packet to the stream.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.write_half.write_all(data).await.map_err(|e| {
            TransportError::connection("failed to write to stream", Some(self.peer), e)
        })
    }
}

/// Splits an accepted stream, arms the first read under `key`, and returns
/// the write half for outbound pushes.
pub fn attach_stream(
    stream: TcpStream,
    key: String,
    completions: &CompletionQueue<StreamReadEvent>,
    shutdown: &CancellationToken,
) -> Result<StreamHandle> {
    let peer = stream
        .peer_addr()
        .map_err(|e| TransportError::network_with_source("failed to get peer address", e))?;
    let (read_half, write_half) = stream.into_split();
    arm_stream_read(key, read_half, PacketBuffer::new(), completions, shutdown);
    debug!(peer = %peer, "stream attached");
    Ok(StreamHandle { write_half, peer })
}

/// Posts one read against the connection's pinned buffer.
pub fn arm_stream_read(
    key: String,
    mut read_half: OwnedReadHalf,
    mut buffer: PacketBuffer,
    completions: &CompletionQueue<StreamReadEvent>,
    shutdown: &CancellationToken,
) {
    let completions = completions.clone();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                Err(io::Error::new(io::ErrorKind::Interrupted, "read aborted"))
            }
            result = read_half.read(buffer.as_mut_slice()) => result,
        };
        completions.post(StreamReadEvent {
            key,
            read_half,
            buffer,
            result,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{completion_queue, Completion};
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn accept_attach_and_exchange() {
        let token = CancellationToken::new();
        let listener = StreamListener::bind(loopback(), token.clone()).await.unwrap();

        let (accept_queue, mut accept_rx) = completion_queue();
        listener.arm_accept(&accept_queue);

        let mut client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();

        let (stream, peer) = match accept_rx.wait().await {
            Some(Completion::Event(event)) => event.result.unwrap(),
            other => panic!("unexpected completion: {other:?}"),
        };
        assert_eq!(peer, client.local_addr().unwrap());

        let (read_queue, mut read_rx) = completion_queue();
        let mut handle =
            attach_stream(stream, peer.to_string(), &read_queue, &token).unwrap();

        client.write_all(b"bid!").await.unwrap();
        let event = match read_rx.wait().await {
            Some(Completion::Event(event)) => event,
            other => panic!("unexpected completion: {other:?}"),
        };
        assert_eq!(event.key, peer.to_string());
        let len = event.result.unwrap();
        assert_eq!(&event.buffer[..len], b"bid!");

        handle.send(b"over").await.unwrap();
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"over");
    }

    #[tokio::test]
    async fn dropping_the_handle_half_closes() {
        let token = CancellationToken::new();
        let listener = StreamListener::bind(loopback(), token.clone()).await.unwrap();

        let (accept_queue, mut accept_rx) = completion_queue();
        listener.arm_accept(&accept_queue);

        let mut client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, peer) = match accept_rx.wait().await {
            Some(Completion::Event(event)) => event.result.unwrap(),
            other => panic!("unexpected completion: {other:?}"),
        };

        let (read_queue, _read_rx) = completion_queue();
        let handle = attach_stream(stream, peer.to_string(), &read_queue, &token).unwrap();
        drop(handle);

        // The client observes end-of-stream once the write side is gone.
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .expect("read before timeout")
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn cancelled_accept_completes_interrupted() {
        let token = CancellationToken::new();
        let listener = StreamListener::bind(loopback(), token.clone()).await.unwrap();

        let (accept_queue, mut accept_rx) = completion_queue();
        listener.arm_accept(&accept_queue);
        token.cancel();

        match accept_rx.wait().await {
            Some(Completion::Event(event)) => {
                assert_eq!(event.result.unwrap_err().kind(), io::ErrorKind::Interrupted);
            }
            other => panic!("unexpected completion: {other:?}"),
        }
    }
}
