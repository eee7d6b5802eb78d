//! Authoritative host: accepts peers, decodes their messages into
//! [`NetEvent`]s, and sends messages back.
//!
//! Each peer gets a reader task and a writer task. The writer drains an
//! unbounded outbox of encoded payloads, so [`HostServer::broadcast`] encodes
//! once and never waits on a slow socket. Heartbeat pings are answered here
//! and never reach the event stream.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc, watch};

use crate::messages::{Message, Pong};
use crate::socket::{SocketConfig, configure_stream, create_listener};
use crate::wire::{WireCodec, WireError};

/// Unique identifier for a connected peer within a host session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

/// Atomic generator for monotonically increasing [`PeerId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`PeerId`].
    pub fn next_id(&self) -> PeerId {
        PeerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Something that happened on a peer connection.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// A peer finished the TCP handshake.
    Connected(PeerId, SocketAddr),
    /// A peer sent a message.
    Message(PeerId, Message),
    /// A peer's connection ended.
    Disconnected(PeerId),
}

/// Error returned when the peer map is at capacity.
#[derive(Debug, thiserror::Error)]
#[error("peer limit reached")]
pub struct PeerLimitReached;

type Payload = Arc<[u8]>;

struct PeerHandle {
    outbox: mpsc::UnboundedSender<Payload>,
    close: watch::Sender<bool>,
}

/// Thread-safe map of connected peers.
pub struct PeerMap {
    inner: RwLock<HashMap<PeerId, PeerHandle>>,
    max_peers: usize,
}

impl PeerMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_peers: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_peers,
        }
    }

    async fn insert(&self, id: PeerId, handle: PeerHandle) -> Result<(), PeerLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_peers {
            return Err(PeerLimitReached);
        }
        map.insert(id, handle);
        Ok(())
    }

    async fn remove(&self, id: PeerId) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    /// Return the number of connected peers.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether no peers are connected.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Connected peer ids, ascending.
    pub async fn ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.inner.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Configuration for [`HostServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:7777`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent peers. Default: 32.
    pub max_peers: usize,
    /// Message codec.
    pub codec: WireCodec,
    /// Socket options.
    pub socket: SocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_peers: 32,
            codec: WireCodec::default(),
            socket: SocketConfig::default(),
        }
    }
}

/// TCP host that accepts peers and routes their messages.
pub struct HostServer {
    config: ServerConfig,
    peers: Arc<PeerMap>,
    id_gen: IdGenerator,
    events: mpsc::UnboundedSender<NetEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl HostServer {
    /// Create a server and the receiver for its events.
    pub fn new(config: ServerConfig) -> (Self, mpsc::UnboundedReceiver<NetEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let server = Self {
            peers: Arc::new(PeerMap::new(config.max_peers)),
            id_gen: IdGenerator::new(),
            config,
            events,
            shutdown_tx,
        };
        (server, events_rx)
    }

    /// Connected peers.
    pub fn peers(&self) -> &PeerMap {
        &self.peers
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = create_listener(self.config.bind_addr, &self.config.socket)?;
        tracing::info!("Host listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, addr) = result?;
                    if let Err(e) = configure_stream(&stream, &self.config.socket) {
                        tracing::warn!("Socket options failed for {addr}: {e}");
                    }
                    self.admit(stream, addr).await;
                }
                _ = stopped(&mut shutdown_rx) => {
                    tracing::info!("Host shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let id = self.id_gen.next_id();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (close, close_rx) = watch::channel(false);

        if self
            .peers
            .insert(id, PeerHandle { outbox: outbox.clone(), close })
            .await
            .is_err()
        {
            tracing::warn!("Peer limit reached, rejecting {addr}");
            return;
        }

        tracing::info!("Accepted peer {id:?} from {addr}");
        let _ = self.events.send(NetEvent::Connected(id, addr));

        let (reader, writer) = stream.into_split();
        let codec = self.config.codec.clone();

        tokio::spawn(write_loop(
            writer,
            outbox_rx,
            codec.clone(),
            close_rx.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let peers = Arc::clone(&self.peers);
        let events = self.events.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            read_loop(id, reader, &codec, &outbox, &events, close_rx, shutdown_rx).await;
            peers.remove(id).await;
            let _ = events.send(NetEvent::Disconnected(id));
            tracing::info!("Peer {id:?} disconnected");
        });
    }

    /// Send one message to one peer.
    ///
    /// # Errors
    ///
    /// [`WireError::Closed`] if the peer is not connected, or an encode error.
    pub async fn send_to(&self, peer: PeerId, msg: &Message) -> Result<(), WireError> {
        let payload: Payload = self.config.codec.encode(msg)?.into();
        let map = self.peers.inner.read().await;
        let handle = map.get(&peer).ok_or(WireError::Closed)?;
        handle.outbox.send(payload).map_err(|_| WireError::Closed)
    }

    /// Send one message to every peer except `except`. Returns the number of
    /// peers it was queued for.
    pub async fn broadcast_except(
        &self,
        except: Option<PeerId>,
        msg: &Message,
    ) -> Result<usize, WireError> {
        let payload: Payload = self.config.codec.encode(msg)?.into();
        let map = self.peers.inner.read().await;
        let mut sent = 0;
        for (id, handle) in map.iter() {
            if Some(*id) != except && handle.outbox.send(Arc::clone(&payload)).is_ok() {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Send one message to every peer.
    pub async fn broadcast(&self, msg: &Message) -> Result<usize, WireError> {
        self.broadcast_except(None, msg).await
    }

    /// Close one peer's connection. Queued messages are flushed first.
    pub async fn disconnect(&self, peer: PeerId) {
        if let Some(handle) = self.peers.inner.read().await.get(&peer) {
            let _ = handle.close.send(true);
        }
    }

    /// Signal the accept loop and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Resolves once the flag is raised or its sender is gone.
pub(crate) async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn read_loop(
    id: PeerId,
    mut reader: OwnedReadHalf,
    codec: &WireCodec,
    outbox: &mpsc::UnboundedSender<Payload>,
    events: &mpsc::UnboundedSender<NetEvent>,
    mut close_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = codec.read(&mut reader) => match result {
                Ok(Message::Ping(ping)) => {
                    let Ok(pong) = codec.encode(&Message::Pong(Pong::from(ping))) else {
                        continue;
                    };
                    let _ = outbox.send(pong.into());
                }
                Ok(msg) => {
                    let _ = events.send(NetEvent::Message(id, msg));
                }
                Err(e) if e.is_closed() => break,
                Err(e) => {
                    tracing::warn!("Dropping peer {id:?}: {e}");
                    break;
                }
            },
            _ = stopped(&mut close_rx) => break,
            _ = stopped(&mut shutdown_rx) => break,
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<Payload>,
    codec: WireCodec,
    mut close_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            payload = outbox.recv() => {
                let Some(payload) = payload else { break };
                if codec.write_encoded(&mut writer, &payload).await.is_err() {
                    break;
                }
            }
            _ = stopped(&mut close_rx) => break,
            _ = stopped(&mut shutdown_rx) => break,
        }
    }
}
