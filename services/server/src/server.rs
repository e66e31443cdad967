//! Server orchestrator.
//!
//! Owns the two endpoints, the connection and item tables, and the three
//! service loops that drain the completion queues: datagram receives,
//! stream accepts, and per-connection stream reads. Packet handling routes
//! by decoded tag; every table mutation and the sends derived from it run
//! under the single auction lock.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gavel_codec::{decode, Message};
use gavel_network::{
    completion_queue, spawn_after, AcceptEvent, Completion, CompletionQueue, CompletionReceiver,
    DatagramEndpoint, DatagramEvent, PacketBuffer, StreamListener, StreamReadEvent,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::item::Item;
use crate::registry::{BidOutcome, ServerState, MAX_LIVE_OFFERS};
use crate::snapshot::Snapshot;

struct Receivers {
    datagram: CompletionReceiver<DatagramEvent>,
    accept: CompletionReceiver<AcceptEvent>,
    stream: CompletionReceiver<StreamReadEvent>,
}

struct Inner {
    config: ServerConfig,
    state: Mutex<ServerState>,
    next_item_id: AtomicU32,
    running: AtomicBool,
    shutdown: CancellationToken,
    udp: DatagramEndpoint,
    listener: StreamListener,
    datagram_queue: CompletionQueue<DatagramEvent>,
    accept_queue: CompletionQueue<AcceptEvent>,
    stream_queue: CompletionQueue<StreamReadEvent>,
    receivers: Mutex<Option<Receivers>>,
    service_loops: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the auction server. Clones share the one underlying server;
/// service loops and auction timers each hold their own.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    /// Binds both endpoints on the configured address.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let shutdown = CancellationToken::new();
        let bind_addr = SocketAddr::new(config.bind_ip, config.port);
        let udp = DatagramEndpoint::bind(bind_addr, shutdown.clone()).await?;
        let listener = StreamListener::bind(bind_addr, shutdown.clone()).await?;

        let (datagram_queue, datagram_rx) = completion_queue();
        let (accept_queue, accept_rx) = completion_queue();
        let (stream_queue, stream_rx) = completion_queue();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ServerState::default()),
                next_item_id: AtomicU32::new(1),
                running: AtomicBool::new(true),
                shutdown,
                udp,
                listener,
                datagram_queue,
                accept_queue,
                stream_queue,
                receivers: Mutex::new(Some(Receivers {
                    datagram: datagram_rx,
                    accept: accept_rx,
                    stream: stream_rx,
                })),
                service_loops: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Datagram endpoint address, once bound. Useful when the configured
    /// port is 0.
    pub fn datagram_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.udp.local_addr()?)
    }

    /// Stream listener address, once bound.
    pub fn stream_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.listener.local_addr()?)
    }

    /// Loads any persisted state, arms the first receive and accept, and
    /// spawns the three service loops.
    pub async fn start(&self) -> Result<()> {
        self.load_snapshot().await?;

        let Some(receivers) = self.inner.receivers.lock().await.take() else {
            warn!("server already started");
            return Ok(());
        };

        info!("datagram endpoint listening on {}", self.datagram_addr()?);
        info!("stream listener listening on {}", self.stream_addr()?);

        self.inner
            .udp
            .arm_receive(PacketBuffer::new(), &self.inner.datagram_queue);
        self.inner.listener.arm_accept(&self.inner.accept_queue);

        let loops = vec![
            tokio::spawn(self.clone().datagram_service(receivers.datagram)),
            tokio::spawn(self.clone().accept_service(receivers.accept)),
            tokio::spawn(self.clone().stream_service(receivers.stream)),
        ];
        *self.inner.service_loops.lock().await = loops;
        Ok(())
    }

    /// Stops the service loops and persists state.
    ///
    /// In-flight receives complete as interrupted, a sentinel drains each
    /// queue, and live auction timers are left to lapse; their elapsed time
    /// rides in the snapshot for the next start.
    pub async fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("shutting down");
        self.inner.shutdown.cancel();

        {
            let mut state = self.inner.state.lock().await;
            self.persist(&state);
            state.connections.clear();
        }

        self.inner.datagram_queue.post_sentinel();
        self.inner.accept_queue.post_sentinel();
        self.inner.stream_queue.post_sentinel();

        let loops = std::mem::take(&mut *self.inner.service_loops.lock().await);
        for handle in loops {
            let _ = handle.await;
        }
        info!("shutdown complete");
    }

    // ---- Service loops -------------------------------------------------

    async fn datagram_service(self, mut completions: CompletionReceiver<DatagramEvent>) {
        info!("datagram service started");
        while self.inner.running.load(Ordering::SeqCst) {
            let Some(completion) = completions.wait().await else {
                break;
            };
            let event = match completion {
                Completion::Sentinel => break,
                Completion::Event(event) => event,
            };
            match event.result {
                Ok((len, peer)) => {
                    self.handle_packet(&event.buffer[..len], peer).await;
                    self.inner
                        .udp
                        .arm_receive(event.buffer, &self.inner.datagram_queue);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
                Err(e) => {
                    error!("datagram receive failed: {e}");
                    break;
                }
            }
        }
        info!("datagram service stopped");
    }

    async fn accept_service(self, mut completions: CompletionReceiver<AcceptEvent>) {
        info!("accept service started");
        while self.inner.running.load(Ordering::SeqCst) {
            let Some(completion) = completions.wait().await else {
                break;
            };
            let event = match completion {
                Completion::Sentinel => break,
                Completion::Event(event) => event,
            };
            match event.result {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(peer = %peer, "failed to configure accepted stream: {e}");
                    }
                    let key = peer.to_string();
                    {
                        let mut state = self.inner.state.lock().await;
                        match state.connections.get_mut(&key) {
                            Some(conn) => {
                                match conn.attach_stream(
                                    stream,
                                    &self.inner.stream_queue,
                                    &self.inner.shutdown,
                                ) {
                                    Ok(()) => info!(client = %key, "stream attached"),
                                    Err(e) => {
                                        warn!(client = %key, "failed to attach stream: {e}")
                                    }
                                }
                            }
                            None => {
                                debug!(peer = %key, "stream from unregistered peer, dropping");
                            }
                        }
                    }
                    self.inner.listener.arm_accept(&self.inner.accept_queue);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
                Err(e) => {
                    error!("accept failed: {e}");
                    break;
                }
            }
        }
        info!("accept service stopped");
    }

    async fn stream_service(self, mut completions: CompletionReceiver<StreamReadEvent>) {
        info!("stream service started");
        while self.inner.running.load(Ordering::SeqCst) {
            let Some(completion) = completions.wait().await else {
                break;
            };
            let event = match completion {
                Completion::Sentinel => break,
                Completion::Event(event) => event,
            };
            let StreamReadEvent {
                key,
                read_half,
                buffer,
                result,
            } = event;
            match result {
                Ok(0) => {
                    // Graceful remote close ends the registration.
                    let mut state = self.inner.state.lock().await;
                    if let Some(mut conn) = state.connections.remove(&key) {
                        info!(client = %key, "client closed stream, removing registration");
                        conn.shutdown_stream();
                        self.persist(&state);
                    }
                }
                Ok(len) => {
                    if let Ok(peer) = key.parse::<SocketAddr>() {
                        self.handle_packet(&buffer[..len], peer).await;
                    }
                    let state = self.inner.state.lock().await;
                    if state
                        .connections
                        .get(&key)
                        .map(|conn| conn.is_connected())
                        .unwrap_or(false)
                    {
                        gavel_network::arm_stream_read(
                            key,
                            read_half,
                            buffer,
                            &self.inner.stream_queue,
                            &self.inner.shutdown,
                        );
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::ConnectionReset
                        || e.kind() == io::ErrorKind::ConnectionAborted =>
                {
                    // Peer crash: drop the stream, keep the registration.
                    warn!(client = %key, "stream reset by peer: {e}");
                    let mut state = self.inner.state.lock().await;
                    if let Some(conn) = state.connections.get_mut(&key) {
                        conn.shutdown_stream();
                    }
                }
                Err(e) => {
                    warn!(client = %key, "stream read failed: {e}");
                    let mut state = self.inner.state.lock().await;
                    if let Some(conn) = state.connections.get_mut(&key) {
                        conn.shutdown_stream();
                    }
                }
            }
        }
        info!("stream service stopped");
    }

    // ---- Packet routing ------------------------------------------------

    async fn handle_packet(&self, data: &[u8], peer: SocketAddr) {
        let message = match decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %peer, "dropping malformed packet: {e}");
                return;
            }
        };
        debug!(peer = %peer, kind = message.message_type().name(), "received");
        match message {
            Message::Register {
                req_num,
                name,
                ip,
                port,
            } => self.handle_register(req_num, name, ip, port, peer).await,
            Message::Deregister { req_num } => self.handle_deregister(req_num, peer).await,
            Message::Offer {
                req_num,
                minimum,
                description,
            } => self.handle_offer(req_num, minimum, description, peer).await,
            Message::Bid { item_id, amount } => self.handle_bid(item_id, amount, peer).await,
            other => {
                debug!(
                    peer = %peer,
                    kind = other.message_type().name(),
                    "ignoring unexpected message"
                );
            }
        }
    }

    async fn handle_register(
        &self,
        req_num: u32,
        name: String,
        ip: String,
        port: String,
        peer: SocketAddr,
    ) {
        let mut state = self.inner.state.lock().await;
        let key = peer.to_string();

        if state.name_taken_by_other(&name, &key) {
            self.send_datagram(
                Message::Unregistered {
                    req_num,
                    reason: "Name already exists".into(),
                },
                peer,
            )
            .await;
            return;
        }

        match state.connections.get_mut(&key) {
            None => {
                info!(client = %key, name = %name, "registering client");
                state
                    .connections
                    .insert(key, Connection::new(name.clone(), peer));
            }
            Some(conn) => {
                info!(client = %key, name = %name, "client already registered, refreshing");
                conn.set_name(name.clone());
                conn.set_addr(peer);
            }
        }
        self.persist(&state);

        self.send_datagram(
            Message::Registered {
                req_num,
                name,
                ip,
                port,
            },
            peer,
        )
        .await;
    }

    async fn handle_deregister(&self, req_num: u32, peer: SocketAddr) {
        let mut state = self.inner.state.lock().await;
        let key = peer.to_string();

        if !state.connections.contains_key(&key) {
            self.send_datagram(
                Message::DeregDenied {
                    req_num,
                    reason: "User not registered".into(),
                },
                peer,
            )
            .await;
            return;
        }
        if state.is_seller(&key) {
            self.send_datagram(
                Message::DeregDenied {
                    req_num,
                    reason: "Pending offer".into(),
                },
                peer,
            )
            .await;
            return;
        }
        if state.is_highest_bidder(&key) {
            self.send_datagram(
                Message::DeregDenied {
                    req_num,
                    reason: "Highest bidder".into(),
                },
                peer,
            )
            .await;
            return;
        }

        self.send_datagram(Message::DeregConf { req_num }, peer).await;
        if let Some(mut conn) = state.connections.remove(&key) {
            info!(client = %key, name = conn.name(), "deregistering client");
            conn.shutdown_stream();
        }
        self.persist(&state);
    }

    async fn handle_offer(
        &self,
        req_num: u32,
        minimum: f32,
        description: String,
        peer: SocketAddr,
    ) {
        let mut state = self.inner.state.lock().await;
        let key = peer.to_string();

        let (connected, last_req, last_item) = match state.connections.get(&key) {
            Some(conn) => (
                conn.is_connected(),
                conn.last_offer_req(),
                conn.last_offered_item(),
            ),
            None => (false, 0, 0),
        };
        if !connected {
            self.send_datagram(
                Message::OfferDenied {
                    req_num,
                    reason: "User not registered".into(),
                },
                peer,
            )
            .await;
            return;
        }

        if state.live_offer_count(&key) >= MAX_LIVE_OFFERS {
            self.send_datagram(
                Message::OfferDenied {
                    req_num,
                    reason: "Too many offers (max 3)".into(),
                },
                peer,
            )
            .await;
            return;
        }

        if req_num > last_req {
            let item_id = self.inner.next_item_id.fetch_add(1, Ordering::SeqCst);
            let item = Item::new(
                item_id,
                description.clone(),
                minimum,
                key.clone(),
                self.inner.config.auction_duration(),
            );
            if let Some(conn) = state.connections.get_mut(&key) {
                conn.record_offer(req_num, item_id);
            }
            self.send_datagram(
                Message::OfferConf {
                    req_num,
                    item_id,
                    minimum,
                    description,
                },
                peer,
            )
            .await;
            self.start_auction(&mut state, item, self.inner.config.auction_duration())
                .await;
        } else if state.items.contains_key(&last_item) {
            // Retransmission of the last offer: answer with the prior id.
            self.send_datagram(
                Message::OfferConf {
                    req_num,
                    item_id: last_item,
                    minimum,
                    description,
                },
                peer,
            )
            .await;
        } else {
            self.send_datagram(
                Message::OfferDenied {
                    req_num,
                    reason: "Invalid request number".into(),
                },
                peer,
            )
            .await;
        }
    }

    async fn handle_bid(&self, item_id: u32, amount: f32, peer: SocketAddr) {
        let mut state = self.inner.state.lock().await;
        let bidder = peer.to_string();
        match state.apply_bid(item_id, amount, &bidder) {
            BidOutcome::Accepted => {
                let description = state
                    .items
                    .get(&item_id)
                    .map(|item| item.description.clone())
                    .unwrap_or_default();
                info!(item = item_id, amount, bidder = %bidder, "new highest bid");
                self.broadcast_stream(
                    &mut state,
                    Message::Highest {
                        item_id,
                        amount,
                        description,
                    },
                )
                .await;
            }
            BidOutcome::UnknownItem => {
                info!(item = item_id, "item not up for auction, ignoring bid");
            }
            BidOutcome::TooLow { current } => {
                info!(
                    item = item_id,
                    bid = amount,
                    current,
                    "bid below current highest, ignoring"
                );
            }
            BidOutcome::OwnItem => {
                info!(item = item_id, bidder = %bidder, "client bid on own item, ignoring");
            }
        }
    }

    // ---- Auction lifecycle ---------------------------------------------

    /// Inserts the item, announces it to every connected client over the
    /// datagram endpoint, schedules its termination, and persists.
    async fn start_auction(&self, state: &mut ServerState, item: Item, remaining: Duration) {
        let item_id = item.id;
        let minimum = item.minimum;
        let description = item.description.clone();
        info!(item = item_id, minimum, "starting auction");
        state.items.insert(item_id, item);

        self.broadcast_datagram(
            state,
            Message::NewItem {
                item_id,
                minimum,
                description,
            },
        )
        .await;

        // The timer captures only the id and a server handle; the registry
        // owns the item and end_auction finds it by id.
        let server = self.clone();
        let _ = spawn_after(remaining, async move {
            server.end_auction(item_id).await;
        });

        self.persist(state);
    }

    /// Timer callback: settles and removes the item.
    async fn end_auction(&self, item_id: u32) {
        let mut state = self.inner.state.lock().await;
        let Some(item) = state.items.remove(&item_id) else {
            return;
        };
        info!(item = item_id, price = item.current_highest, "auction ended");
        self.persist(&state);

        self.broadcast_stream(
            &mut state,
            Message::BidOver {
                item_id,
                amount: item.current_highest,
            },
        )
        .await;

        if item.has_bids() {
            // The winner is told who sold; the seller is told who bought.
            let (seller_name, seller_ip) = state
                .connections
                .get(&item.seller)
                .map(|conn| (conn.name().to_string(), conn.key()))
                .unwrap_or_default();
            let (winner_name, winner_ip) = state
                .connections
                .get(&item.highest_bidder)
                .map(|conn| (conn.name().to_string(), conn.key()))
                .unwrap_or_default();

            self.stream_send_to(
                &mut state,
                &item.highest_bidder,
                Message::Win {
                    item_id,
                    amount: item.current_highest,
                    name: seller_name,
                    ip: seller_ip,
                },
            )
            .await;
            self.stream_send_to(
                &mut state,
                &item.seller,
                Message::SoldTo {
                    item_id,
                    amount: item.current_highest,
                    name: winner_name,
                    ip: winner_ip,
                },
            )
            .await;
        } else {
            self.stream_send_to(
                &mut state,
                &item.seller,
                Message::NotSold {
                    item_id,
                    reason: "No valid bids".into(),
                },
            )
            .await;
        }
    }

    // ---- Outbound ------------------------------------------------------

    async fn send_datagram(&self, message: Message, peer: SocketAddr) {
        debug!(peer = %peer, kind = message.message_type().name(), "sending");
        self.inner.udp.send_to(&message.encode(), peer).await;
    }

    /// Sends to every connected client over the datagram endpoint.
    async fn broadcast_datagram(&self, state: &ServerState, message: Message) {
        let packet = message.encode();
        let kind = message.message_type().name();
        for conn in state.connections.values() {
            if conn.is_connected() {
                debug!(peer = %conn.addr(), kind, "sending");
                self.inner.udp.send_to(&packet, conn.addr()).await;
            }
        }
    }

    /// Pushes to every connected client over its stream. Failed streams are
    /// released so the client drops back to datagram-only state.
    async fn broadcast_stream(&self, state: &mut ServerState, message: Message) {
        let packet = message.encode();
        let kind = message.message_type().name();
        let mut failed = Vec::new();
        for (key, conn) in state.connections.iter_mut() {
            if !conn.is_connected() {
                continue;
            }
            debug!(peer = %conn.addr(), kind, "pushing");
            if let Err(e) = conn.send(&packet).await {
                warn!(client = %key, "stream push failed: {e}");
                failed.push(key.clone());
            }
        }
        for key in failed {
            if let Some(conn) = state.connections.get_mut(&key) {
                conn.shutdown_stream();
            }
        }
    }

    /// Pushes to one client's stream, if it is connected.
    async fn stream_send_to(&self, state: &mut ServerState, key: &str, message: Message) {
        let Some(conn) = state.connections.get_mut(key) else {
            return;
        };
        if !conn.is_connected() {
            return;
        }
        debug!(peer = %conn.addr(), kind = message.message_type().name(), "pushing");
        if let Err(e) = conn.send(&message.encode()).await {
            warn!(client = %key, "stream push failed: {e}");
            conn.shutdown_stream();
        }
    }

    // ---- Persistence ---------------------------------------------------

    /// Rewrites the sidecar file; failures are logged and the server keeps
    /// serving, accepting the risk of loss on restart.
    fn persist(&self, state: &ServerState) {
        if let Err(e) = Snapshot::capture(state).save(&self.inner.config.snapshot_path) {
            error!("failed to save snapshot: {e}");
        }
    }

    /// Reinstates persisted connections (without stream state) and revives
    /// live auctions with their remaining time.
    async fn load_snapshot(&self) -> Result<()> {
        let Some(snapshot) = Snapshot::load(&self.inner.config.snapshot_path)? else {
            return Ok(());
        };
        let mut state = self.inner.state.lock().await;

        for conn in snapshot.connections {
            let addr = SocketAddr::new(conn.ip, conn.port);
            info!(client = %addr, name = %conn.name, "reinstated registration");
            state
                .connections
                .insert(addr.to_string(), Connection::new(conn.name, addr));
        }

        let total = self.inner.config.auction_duration();
        let mut highest_id = 0;
        for record in snapshot.items {
            highest_id = highest_id.max(record.id);
            let remaining = total.saturating_sub(record.elapsed);
            let mut item = Item::new(
                record.id,
                record.description,
                record.minimum,
                record.seller,
                total,
            );
            item.current_highest = record.current_highest;
            item.highest_bidder = record.highest_bidder;
            item.backdate(record.elapsed);
            info!(
                item = record.id,
                remaining_ms = remaining.as_millis() as u64,
                "revived auction"
            );
            self.start_auction(&mut state, item, remaining).await;
        }
        if highest_id > 0 {
            self.inner.next_item_id.store(highest_id + 1, Ordering::SeqCst);
        }
        Ok(())
    }
}
