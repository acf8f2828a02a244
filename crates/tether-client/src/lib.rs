//! # tether-client
//!
//! Client side of the secure channel: drives the Noise XX handshake for a
//! [`Device`], then hands back an encrypted [`NoiseSocket`].
//!
//! ## Modules
//!
//! - [`handshake`]: the three-message handshake and certificate check
//! - [`payload`]: login / registration payload sent in the final message
//! - [`config`]: TOML configuration for the `tether` binary
//! - [`error`]: [`Error`] with a coarse [`ErrorKind`]

pub mod config;
pub mod error;
pub mod handshake;
pub mod payload;

pub use config::{ClientConfig, ConfigError};
pub use error::{Error, ErrorKind, HandshakeError};
pub use handshake::{do_handshake, HandshakeConfig, HandshakeOutcome};
pub use payload::ClientPayload;

use tether_crypto::keys::KeyPair;
use tether_store::Device;
use tether_transport::{FrameSocket, NoiseSocket, TransportError};
use tokio::net::TcpStream;
use tracing::debug;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Open a TCP connection to `address` and run one handshake attempt.
pub async fn connect(
    address: &str,
    device: &mut Device,
    config: &HandshakeConfig,
) -> Result<NoiseSocket<TcpStream>> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(TransportError::from)?;
    stream.set_nodelay(true).map_err(TransportError::from)?;
    debug!(%address, "connected");

    let frames =
        FrameSocket::new(stream, &config.header).with_max_frame_size(config.max_frame_size);
    let outcome = do_handshake(frames, device, KeyPair::generate(), config).await?;
    Ok(outcome.into_socket())
}
