//! TCP networking for host and peers: message types, compression, framing,
//! and connection lifecycle.

pub mod compression;
pub mod framing;
pub mod messages;
pub mod socket;
pub mod tcp_client;
pub mod tcp_server;
pub mod wire;

pub use compression::{CompressionConfig, CompressionError};
pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use messages::{
    BlockDamage, BlockEdit, DamageRequest, EditRequest, JoinRequest, MapStatus, Message,
    MessageError, PROTOCOL_VERSION, Ping, PlayerPosition, Pong, Welcome,
};
pub use socket::{SocketConfig, configure_stream, create_listener};
pub use tcp_client::{ClientConfig, ConnectionState, ConnectionStateWatch, PeerClient};
pub use tcp_server::{
    HostServer, IdGenerator, NetEvent, PeerId, PeerLimitReached, PeerMap, ServerConfig,
};
pub use wire::{WireCodec, WireError};
