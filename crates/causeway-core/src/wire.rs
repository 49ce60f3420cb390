//! Causeway wire format — on-wire types for the peer ↔ gateway protocol.
//!
//! Each HTTP exchange carries exactly one peer message in the request body
//! and exactly one server message in the response body. A message is a fixed
//! packed header followed by its variable-length fields in declaration order:
//! session id, device id (peer messages only), payload bytes.
//!
//! All headers are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use bytes::{Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Current wire format version. A decoder seeing any other version rejects
/// the message.
pub const WIRE_VERSION: u8 = 0x01;

/// Maximum payload size in bytes for a single message.
/// Larger data must be split by the sender across multiple exchanges.
pub const MAX_DATA_LEN: usize = 4 * 1024 * 1024;

/// Magic bytes opening the relay-server join exchange.
pub const JOIN_MAGIC: [u8; 4] = *b"CWAY";

// ── Message type tags ─────────────────────────────────────────────────────────

/// Peer → gateway message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerMessageType {
    /// Open a relay session to a device. Carries the device id.
    Connect = 0x01,
    /// Tear down a session.
    PeerClosing = 0x02,
    /// Forward payload bytes to the session's relay socket.
    PeerToRelay = 0x03,
    /// Poll for inbound relay data, blocking up to the gateway's maximum wait.
    WaitForData = 0x04,
}

impl TryFrom<u8> for PeerMessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PeerMessageType::Connect),
            0x02 => Ok(PeerMessageType::PeerClosing),
            0x03 => Ok(PeerMessageType::PeerToRelay),
            0x04 => Ok(PeerMessageType::WaitForData),
            other => Err(WireError::UnknownPeerMessageType(other)),
        }
    }
}

impl From<PeerMessageType> for u8 {
    fn from(t: PeerMessageType) -> u8 {
        t as u8
    }
}

/// Gateway → peer message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerMessageType {
    /// Session established. Carries the session id and the socket role flag.
    PeerConnected = 0x01,
    /// Session torn down at the peer's request.
    ServerClosing = 0x02,
    /// Payload accepted and written to the relay socket.
    DataAccepted = 0x03,
    /// Inbound relay data (possibly empty on a poll timeout).
    RelayToPeer = 0x04,
    /// Request failed. Payload is a UTF-8 description of the failure.
    Error = 0x05,
}

impl TryFrom<u8> for ServerMessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        match value {
            0x01 => Ok(ServerMessageType::PeerConnected),
            0x02 => Ok(ServerMessageType::ServerClosing),
            0x03 => Ok(ServerMessageType::DataAccepted),
            0x04 => Ok(ServerMessageType::RelayToPeer),
            0x05 => Ok(ServerMessageType::Error),
            other => Err(WireError::UnknownServerMessageType(other)),
        }
    }
}

impl From<ServerMessageType> for u8 {
    fn from(t: ServerMessageType) -> u8 {
        t as u8
    }
}

// ── Headers ───────────────────────────────────────────────────────────────────

/// Fixed header of a peer → gateway message.
///
/// Wire size: 18 bytes. Followed by session_id_len bytes of session id,
/// device_id_len bytes of device id, and data_len bytes of payload.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PeerMessageHeader {
    pub version: u8,
    pub message_type: u8,
    pub session_id_len: u16,
    pub device_id_len: u16,
    pub data_len: u32,
    /// Per-session exchange counter. Informational; echoed in the response.
    pub sequence: u64,
}

assert_eq_size!(PeerMessageHeader, [u8; 18]);

/// Fixed header of a gateway → peer message.
///
/// Wire size: 18 bytes. Followed by session_id_len bytes of session id and
/// data_len bytes of payload.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ServerMessageHeader {
    pub version: u8,
    pub message_type: u8,
    /// Non-zero when the bridged relay connection gave this session the
    /// server-socket role. Meaningful on PeerConnected only.
    pub is_server_socket: u8,
    /// Reserved, must be zero.
    pub reserved: u8,
    pub session_id_len: u16,
    pub data_len: u32,
    pub sequence: u64,
}

assert_eq_size!(ServerMessageHeader, [u8; 18]);

// ── Decoded messages ──────────────────────────────────────────────────────────

/// One decoded peer → gateway message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessage {
    pub message_type: PeerMessageType,
    pub session_id: String,
    pub device_id: String,
    pub sequence: u64,
    pub data: Bytes,
}

impl PeerMessage {
    pub fn connect(device_id: &str) -> Self {
        Self {
            message_type: PeerMessageType::Connect,
            session_id: String::new(),
            device_id: device_id.to_string(),
            sequence: 0,
            data: Bytes::new(),
        }
    }

    pub fn peer_closing(session_id: &str) -> Self {
        Self {
            message_type: PeerMessageType::PeerClosing,
            session_id: session_id.to_string(),
            device_id: String::new(),
            sequence: 0,
            data: Bytes::new(),
        }
    }

    pub fn peer_to_relay(session_id: &str, data: impl Into<Bytes>) -> Self {
        Self {
            message_type: PeerMessageType::PeerToRelay,
            session_id: session_id.to_string(),
            device_id: String::new(),
            sequence: 0,
            data: data.into(),
        }
    }

    pub fn wait_for_data(session_id: &str) -> Self {
        Self {
            message_type: PeerMessageType::WaitForData,
            session_id: session_id.to_string(),
            device_id: String::new(),
            sequence: 0,
            data: Bytes::new(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn encode(&self) -> Bytes {
        let header = PeerMessageHeader {
            version: WIRE_VERSION,
            message_type: self.message_type.into(),
            session_id_len: self.session_id.len() as u16,
            device_id_len: self.device_id.len() as u16,
            data_len: self.data.len() as u32,
            sequence: self.sequence,
        };
        let mut out = BytesMut::with_capacity(
            std::mem::size_of::<PeerMessageHeader>()
                + self.session_id.len()
                + self.device_id.len()
                + self.data.len(),
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.session_id.as_bytes());
        out.extend_from_slice(self.device_id.as_bytes());
        out.extend_from_slice(&self.data);
        out.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        const HEADER_LEN: usize = std::mem::size_of::<PeerMessageHeader>();
        let header = PeerMessageHeader::read_from_prefix(bytes).ok_or(WireError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        })?;
        // Copy packed fields to locals to avoid unaligned reference UB.
        let version = header.version;
        if version != WIRE_VERSION {
            return Err(WireError::UnknownVersion(version));
        }
        let message_type = PeerMessageType::try_from(header.message_type)?;
        let session_id_len = usize::from(header.session_id_len);
        let device_id_len = usize::from(header.device_id_len);
        let data_len = header.data_len as usize;
        if data_len > MAX_DATA_LEN {
            return Err(WireError::PayloadTooLarge(data_len));
        }
        let expected = HEADER_LEN + session_id_len + device_id_len + data_len;
        if bytes.len() < expected {
            return Err(WireError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        let mut offset = HEADER_LEN;
        let session_id = utf8_field(&bytes[offset..offset + session_id_len], "session_id")?;
        offset += session_id_len;
        let device_id = utf8_field(&bytes[offset..offset + device_id_len], "device_id")?;
        offset += device_id_len;
        let data = Bytes::copy_from_slice(&bytes[offset..offset + data_len]);
        Ok(Self {
            message_type,
            session_id,
            device_id,
            sequence: header.sequence,
            data,
        })
    }
}

/// One decoded gateway → peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub message_type: ServerMessageType,
    pub session_id: String,
    pub is_server_socket: bool,
    pub sequence: u64,
    pub data: Bytes,
}

impl ServerMessage {
    pub fn peer_connected(session_id: &str, is_server_socket: bool, sequence: u64) -> Self {
        Self {
            message_type: ServerMessageType::PeerConnected,
            session_id: session_id.to_string(),
            is_server_socket,
            sequence,
            data: Bytes::new(),
        }
    }

    pub fn server_closing(sequence: u64) -> Self {
        Self {
            message_type: ServerMessageType::ServerClosing,
            session_id: String::new(),
            is_server_socket: false,
            sequence,
            data: Bytes::new(),
        }
    }

    pub fn data_accepted(sequence: u64) -> Self {
        Self {
            message_type: ServerMessageType::DataAccepted,
            session_id: String::new(),
            is_server_socket: false,
            sequence,
            data: Bytes::new(),
        }
    }

    pub fn relay_to_peer(session_id: &str, data: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            message_type: ServerMessageType::RelayToPeer,
            session_id: session_id.to_string(),
            is_server_socket: false,
            sequence,
            data: data.into(),
        }
    }

    pub fn error(description: &str, sequence: u64) -> Self {
        Self {
            message_type: ServerMessageType::Error,
            session_id: String::new(),
            is_server_socket: false,
            sequence,
            data: Bytes::from(description.to_string()),
        }
    }

    pub fn encode(&self) -> Bytes {
        let header = ServerMessageHeader {
            version: WIRE_VERSION,
            message_type: self.message_type.into(),
            is_server_socket: u8::from(self.is_server_socket),
            reserved: 0,
            session_id_len: self.session_id.len() as u16,
            data_len: self.data.len() as u32,
            sequence: self.sequence,
        };
        let mut out = BytesMut::with_capacity(
            std::mem::size_of::<ServerMessageHeader>() + self.session_id.len() + self.data.len(),
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.session_id.as_bytes());
        out.extend_from_slice(&self.data);
        out.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        const HEADER_LEN: usize = std::mem::size_of::<ServerMessageHeader>();
        let header = ServerMessageHeader::read_from_prefix(bytes).ok_or(WireError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        })?;
        let version = header.version;
        if version != WIRE_VERSION {
            return Err(WireError::UnknownVersion(version));
        }
        let message_type = ServerMessageType::try_from(header.message_type)?;
        let session_id_len = usize::from(header.session_id_len);
        let data_len = header.data_len as usize;
        if data_len > MAX_DATA_LEN {
            return Err(WireError::PayloadTooLarge(data_len));
        }
        let expected = HEADER_LEN + session_id_len + data_len;
        if bytes.len() < expected {
            return Err(WireError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        let session_id = utf8_field(&bytes[HEADER_LEN..HEADER_LEN + session_id_len], "session_id")?;
        let offset = HEADER_LEN + session_id_len;
        let data = Bytes::copy_from_slice(&bytes[offset..offset + data_len]);
        Ok(Self {
            message_type,
            session_id,
            is_server_socket: header.is_server_socket != 0,
            sequence: header.sequence,
            data,
        })
    }
}

fn utf8_field(bytes: &[u8], field: &'static str) -> Result<String, WireError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| WireError::InvalidString(field))
}

// ── Relay-server join exchange ────────────────────────────────────────────────

/// First frame of the session-mode join exchange with the relay server.
///
/// The connect key identifies the target device without exposing the device
/// id itself on the wire. Wire size: 40 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct SessionJoin {
    pub magic: [u8; 4],
    pub version: u8,
    /// Reserved, must be zero.
    pub reserved: [u8; 3],
    /// BLAKE3 hash of the target device id.
    pub connect_key: [u8; 32],
}

assert_eq_size!(SessionJoin, [u8; 40]);

/// Relay server's answer to a SessionJoin. Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct SessionJoinAck {
    pub magic: [u8; 4],
    pub version: u8,
    /// Non-zero when the session was accepted.
    pub accepted: u8,
    /// Which side of the bridged connection holds the server-socket role.
    pub is_server_socket: u8,
    /// Reserved, must be zero.
    pub reserved: u8,
}

assert_eq_size!(SessionJoinAck, [u8; 8]);

/// Compute the join connect key for a device id.
pub fn connect_key(device_id: &str) -> [u8; 32] {
    *blake3::hash(device_id.as_bytes()).as_bytes()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown wire version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("unknown peer message type: 0x{0:02x}")]
    UnknownPeerMessageType(u8),

    #[error("unknown server message type: 0x{0:02x}")]
    UnknownServerMessageType(u8),

    #[error("message truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("payload length {0} exceeds maximum {}", MAX_DATA_LEN)]
    PayloadTooLarge(usize),

    #[error("{0} field is not valid utf-8")]
    InvalidString(&'static str),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
