//! Relay socket connector — the seam to the external relay protocol.
//!
//! The gateway never speaks the relay protocol itself; it asks a connector
//! for an established bidirectional stream to a device and the socket-role
//! flag that came out of the relay negotiation. Tests substitute an
//! in-memory connector.

use std::mem::size_of;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use zerocopy::{AsBytes, FromBytes};

use causeway_core::wire::{connect_key, SessionJoin, SessionJoinAck, JOIN_MAGIC, WIRE_VERSION};

/// Object-safe alias for the byte streams a connector hands out.
pub trait RelayIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> RelayIo for T {}

pub type RelayStream = Box<dyn RelayIo>;

/// An established relay connection to a device.
pub struct RelayLink {
    pub stream: RelayStream,
    /// True when the relay negotiation gave this side the server-socket role.
    pub is_server_socket: bool,
}

impl std::fmt::Debug for RelayLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLink")
            .field("is_server_socket", &self.is_server_socket)
            .finish_non_exhaustive()
    }
}

/// Bound on the whole join exchange, connect included.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("relay server {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("join exchange with relay server failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("relay server rejected session for device {0}")]
    Rejected(String),

    #[error("malformed join ack from relay server")]
    Protocol,

    #[error("join exchange timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens relay sessions to remote devices.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn open_session(&self, device_id: &str) -> Result<RelayLink, ConnectError>;
}

/// Production connector: TCP to the relay server, session-mode join exchange.
pub struct TcpRelayConnector {
    relay_addr: String,
}

impl TcpRelayConnector {
    pub fn new(relay_addr: impl Into<String>) -> Self {
        Self {
            relay_addr: relay_addr.into(),
        }
    }
}

#[async_trait]
impl RelayConnector for TcpRelayConnector {
    async fn open_session(&self, device_id: &str) -> Result<RelayLink, ConnectError> {
        let join = async {
            let mut stream = TcpStream::connect(&self.relay_addr)
                .await
                .map_err(|e| ConnectError::Unreachable {
                    addr: self.relay_addr.clone(),
                    source: e,
                })?;
            stream.set_nodelay(true).ok();

            let request = SessionJoin {
                magic: JOIN_MAGIC,
                version: WIRE_VERSION,
                reserved: [0; 3],
                connect_key: connect_key(device_id),
            };
            stream.write_all(request.as_bytes()).await.map_err(ConnectError::Io)?;
            stream.flush().await.map_err(ConnectError::Io)?;

            let mut buf = [0u8; size_of::<SessionJoinAck>()];
            stream.read_exact(&mut buf).await.map_err(ConnectError::Io)?;
            Ok::<_, ConnectError>((stream, buf))
        };

        let (stream, buf) = tokio::time::timeout(JOIN_TIMEOUT, join)
            .await
            .map_err(|_| ConnectError::Timeout(JOIN_TIMEOUT))??;

        let ack = SessionJoinAck::read_from(&buf[..]).ok_or(ConnectError::Protocol)?;
        let magic = ack.magic;
        let version = ack.version;
        if magic != JOIN_MAGIC || version != WIRE_VERSION {
            return Err(ConnectError::Protocol);
        }
        if ack.accepted == 0 {
            return Err(ConnectError::Rejected(device_id.to_string()));
        }

        let is_server_socket = ack.is_server_socket != 0;
        tracing::debug!(device_id, is_server_socket, "relay session joined");
        Ok(RelayLink {
            stream: Box::new(stream),
            is_server_socket,
        })
    }
}
