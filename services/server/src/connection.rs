//! Per-client connection state.

use std::net::SocketAddr;

use gavel_network::{CompletionQueue, StreamHandle, StreamReadEvent, TransportError};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A registered client.
///
/// Identity is the datagram peer address; the stream is an optional
/// companion for push notifications and may attach and detach without
/// affecting registration. Offer bookkeeping lives here so retransmitted
/// offers can be answered idempotently.
#[derive(Debug)]
pub struct Connection {
    name: String,
    addr: SocketAddr,
    stream: Option<StreamHandle>,
    last_offer_req: u32,
    last_offered_item: u32,
}

impl Connection {
    pub fn new(name: String, addr: SocketAddr) -> Self {
        Self {
            name,
            addr,
            stream: None,
            last_offer_req: 0,
            last_offered_item: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_addr(&mut self, addr: SocketAddr) {
        self.addr = addr;
    }

    /// Table key: the string form of the datagram address. The same key
    /// routes this connection's stream-read completions.
    pub fn key(&self) -> String {
        self.addr.to_string()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn last_offer_req(&self) -> u32 {
        self.last_offer_req
    }

    pub fn last_offered_item(&self) -> u32 {
        self.last_offered_item
    }

    pub fn record_offer(&mut self, req_num: u32, item_id: u32) {
        self.last_offer_req = req_num;
        self.last_offered_item = item_id;
    }

    /// Binds an accepted stream to this connection's completion key and arms
    /// the first read. Any previous stream is shut down first.
    pub fn attach_stream(
        &mut self,
        stream: TcpStream,
        completions: &CompletionQueue<StreamReadEvent>,
        shutdown: &CancellationToken,
    ) -> Result<(), TransportError> {
        self.shutdown_stream();
        let handle = gavel_network::attach_stream(stream, self.key(), completions, shutdown)?;
        self.stream = Some(handle);
        Ok(())
    }

    /// Sends one packet over the stream, if one is attached.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self.stream.as_mut() {
            Some(stream) => stream.send(data).await,
            None => Ok(()),
        }
    }

    /// Half-closes and releases the stream; idempotent. Registration and
    /// offer bookkeeping survive, so the client can reconnect.
    pub fn shutdown_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(peer = %stream.peer(), "stream released");
        }
    }
}
