//! Gateway error taxonomy.
//!
//! Every failure while processing one peer message maps to one of these
//! kinds; the handler renders them into structured error responses so the
//! HTTP exchange always completes with a well-formed body.

use crate::connector::ConnectError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or missing required field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation referenced an unknown or already-closed session.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Id collision on insert. Practically unreachable with random ids.
    #[error("duplicate session id: {0}")]
    DuplicateSession(String),

    /// The relay socket could not be established.
    #[error("relay connect failed: {0}")]
    ConnectFailure(#[from] ConnectError),

    /// Read/write failure on an established relay socket.
    #[error("session i/o failed: {0}")]
    IoFailure(String),

    /// Protocol-contract violation by the peer.
    #[error("unsupported message type: 0x{0:02x}")]
    UnsupportedMessageType(u8),
}
