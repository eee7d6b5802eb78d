//! TCP client for connecting a peer to a Breach host.
//!
//! Manages the full connection lifecycle: connecting, heartbeat keepalive,
//! and clean disconnect. State changes are broadcast via a [`watch`] channel
//! so any number of consumers can react without polling. Decoded messages
//! other than heartbeat replies arrive on the receiver returned by
//! [`PeerClient::connect`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::messages::{Message, Ping};
use crate::socket::{SocketConfig, configure_stream};
use crate::tcp_server::stopped;
use crate::wire::{WireCodec, WireError};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// TCP connection established, ready for communication.
    Connected,
    /// Connection lost or intentionally closed.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        self.tx.send_replace(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }
}

/// Client-side connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How often to ping the host. Default: 5s.
    pub ping_interval: Duration,
    /// Silence after which the host is considered gone. Default: 15s.
    pub timeout: Duration,
    /// Message codec.
    pub codec: WireCodec,
    /// Socket options.
    pub socket: SocketConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            codec: WireCodec::default(),
            socket: SocketConfig::default(),
        }
    }
}

/// Handle to a connected host session.
pub struct PeerClient {
    codec: WireCodec,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<ConnectionStateWatch>,
    /// Sending `true` causes the background tasks to exit.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl PeerClient {
    /// Connect to the host at `addr`.
    ///
    /// Spawns reader, writer, and heartbeat tasks and returns immediately
    /// after the TCP handshake, together with the inbound message receiver.
    pub async fn connect(
        addr: SocketAddr,
        config: ClientConfig,
    ) -> std::io::Result<(Self, mpsc::UnboundedReceiver<Message>)> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                state.set(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        configure_stream(&stream, &config.socket)?;
        state.set(ConnectionState::Connected);
        tracing::info!("Connected to host at {addr}");

        let (reader, writer) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let (pong_tx, pong_rx) = watch::channel(Instant::now());

        tokio::spawn(read_loop(
            reader,
            config.codec.clone(),
            inbox,
            pong_tx,
            Arc::clone(&state),
            shutdown_tx.subscribe(),
        ));
        tokio::spawn(write_loop(
            writer,
            config.codec.clone(),
            outbox_rx,
            Arc::clone(&state),
            shutdown_tx.subscribe(),
        ));
        tokio::spawn(heartbeat_loop(
            config.clone(),
            outbox.clone(),
            pong_rx,
            Arc::clone(&state),
            Arc::clone(&shutdown_tx),
        ));

        let client = Self {
            codec: config.codec,
            outbox,
            state,
            shutdown_tx,
        };
        Ok((client, inbox_rx))
    }

    /// Return the connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Queue a message for the host.
    ///
    /// # Errors
    ///
    /// [`WireError::Closed`] once the connection is gone, or an encode error.
    pub fn send(&self, msg: &Message) -> Result<(), WireError> {
        if self.state.current() == ConnectionState::Disconnected {
            return Err(WireError::Closed);
        }
        let payload = self.codec.encode(msg)?;
        self.outbox.send(payload).map_err(|_| WireError::Closed)
    }

    /// Disconnect from the host.
    ///
    /// Signals background tasks to exit and transitions state to
    /// [`ConnectionState::Disconnected`] immediately.
    pub fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
        self.state.set(ConnectionState::Disconnected);
    }
}

impl Drop for PeerClient {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    codec: WireCodec,
    inbox: mpsc::UnboundedSender<Message>,
    pong_tx: watch::Sender<Instant>,
    state: Arc<ConnectionStateWatch>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = codec.read(&mut reader) => match result {
                Ok(Message::Pong(_)) => {
                    pong_tx.send_replace(Instant::now());
                }
                Ok(msg) => {
                    let _ = inbox.send(msg);
                }
                Err(e) => {
                    if !e.is_closed() {
                        tracing::warn!("Dropping host connection: {e}");
                    }
                    state.set(ConnectionState::Disconnected);
                    break;
                }
            },
            _ = stopped(&mut shutdown_rx) => break,
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    codec: WireCodec,
    mut outbox: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<ConnectionStateWatch>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            payload = outbox.recv() => {
                let Some(payload) = payload else { break };
                if codec.write_encoded(&mut writer, &payload).await.is_err() {
                    state.set(ConnectionState::Disconnected);
                    break;
                }
            }
            _ = stopped(&mut shutdown_rx) => break,
        }
    }
}

/// Pings every `ping_interval`. With no pong for `timeout`, marks the
/// connection [`ConnectionState::Disconnected`] and stops the other tasks.
async fn heartbeat_loop(
    config: ClientConfig,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    pong_rx: watch::Receiver<Instant>,
    state: Arc<ConnectionStateWatch>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut interval = tokio::time::interval(config.ping_interval);
    let mut sequence: u32 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if state.current() != ConnectionState::Connected {
                    break;
                }

                let silent_for = pong_rx.borrow().elapsed();
                if silent_for > config.timeout {
                    tracing::warn!("Heartbeat timeout, no response in {:?}", config.timeout);
                    state.set(ConnectionState::Disconnected);
                    shutdown_tx.send_replace(true);
                    break;
                }

                let ping = Message::Ping(Ping {
                    timestamp_ms: now_ms(),
                    sequence,
                });
                sequence = sequence.wrapping_add(1);
                let Ok(payload) = config.codec.encode(&ping) else {
                    continue;
                };
                if outbox.send(payload).is_err() {
                    break;
                }
            }
            _ = stopped(&mut shutdown_rx) => break,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
