//! Translation from the `network` config section to transport settings.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

use breach_config::NetworkConfig;
use breach_net::{ServerConfig, SocketConfig, WireCodec};
use breach_world::WorldError;

/// Errors that stop the host before or while it runs.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `network.bind_address` is not an IP address.
    #[error("invalid bind address {address:?}: {source}")]
    BindAddress {
        /// The configured address.
        address: String,
        /// Parse failure.
        source: AddrParseError,
    },
    /// The world could not be built from the config.
    #[error("world: {0}")]
    World(#[from] WorldError),
    /// Socket failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the transport config for the host.
///
/// # Errors
///
/// [`ServerError::BindAddress`] if the bind address does not parse.
pub fn server_config(network: &NetworkConfig) -> Result<ServerConfig, ServerError> {
    let ip: IpAddr = network
        .bind_address
        .parse()
        .map_err(|source| ServerError::BindAddress {
            address: network.bind_address.clone(),
            source,
        })?;

    Ok(ServerConfig {
        bind_addr: SocketAddr::new(ip, network.port),
        max_peers: network.max_peers as usize,
        codec: WireCodec::new(network.max_frame_bytes, network.compression_threshold),
        socket: SocketConfig::default(),
    })
}

/// Duration of one simulation tick. A zero rate is treated as 1 Hz.
pub fn tick_interval(network: &NetworkConfig) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(network.tick_rate.max(1)))
}
