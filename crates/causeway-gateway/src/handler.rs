//! Peer message handler — one decoded peer message in, one server message out.
//!
//! This is the protocol state machine behind the HTTP surface: it dispatches
//! by message type to the connector and the session table, and converts every
//! failure into a structured error response. Whatever the peer sends, the
//! exchange completes with a well-formed body; an internal fault never
//! surfaces as a broken transport response.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use causeway_core::wire::{PeerMessage, PeerMessageType, ServerMessage, WireError};

use crate::connector::RelayConnector;
use crate::error::GatewayError;
use crate::session::SessionConnection;
use crate::table::SessionTable;

/// Tuning knobs for the message handler.
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    /// Longest a WaitForData exchange may block before returning empty.
    pub max_wait_for_data: Duration,
    /// Bound on a single relay-socket write.
    pub write_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_wait_for_data: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

pub struct MessageHandler {
    connector: Arc<dyn RelayConnector>,
    sessions: SessionTable,
    closed_tx: mpsc::UnboundedSender<String>,
    options: GatewayOptions,
}

impl MessageHandler {
    pub fn new(
        connector: Arc<dyn RelayConnector>,
        sessions: SessionTable,
        closed_tx: mpsc::UnboundedSender<String>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            connector,
            sessions,
            closed_tx,
            options,
        }
    }

    /// Handle one encoded peer message, producing one encoded server message.
    /// Never fails at this level; failures ride inside the response.
    pub async fn handle(&self, request: &[u8]) -> Bytes {
        let response = match PeerMessage::decode(request) {
            Ok(message) => {
                tracing::debug!(
                    message_type = ?message.message_type,
                    session_id = %message.session_id,
                    sequence = message.sequence,
                    "handling peer message"
                );
                let sequence = message.sequence;
                match self.dispatch(message).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(error = %e, "peer message failed");
                        ServerMessage::error(&e.to_string(), sequence)
                    }
                }
            }
            Err(WireError::UnknownPeerMessageType(tag)) => {
                let e = GatewayError::UnsupportedMessageType(tag);
                tracing::warn!(error = %e, "peer message rejected");
                ServerMessage::error(&e.to_string(), 0)
            }
            Err(e) => {
                let e = GatewayError::InvalidArgument(e.to_string());
                tracing::warn!(error = %e, "peer message rejected");
                ServerMessage::error(&e.to_string(), 0)
            }
        };
        tracing::debug!(
            message_type = ?response.message_type,
            session_id = %response.session_id,
            sequence = response.sequence,
            "sending server response"
        );
        response.encode()
    }

    async fn dispatch(&self, message: PeerMessage) -> Result<ServerMessage, GatewayError> {
        match message.message_type {
            PeerMessageType::Connect => self.connect(&message).await,
            PeerMessageType::PeerClosing => {
                let connection = self.require_session(&message.session_id)?;
                connection.close().await;
                // Remove before responding so the next exchange referencing
                // this id deterministically misses.
                self.sessions.remove(&message.session_id);
                Ok(ServerMessage::server_closing(message.sequence))
            }
            PeerMessageType::PeerToRelay => {
                let connection = self.require_session(&message.session_id)?;
                match connection.send(&message.data).await {
                    Ok(()) => Ok(ServerMessage::data_accepted(message.sequence)),
                    Err(e) => {
                        // The socket can no longer be trusted.
                        connection.close().await;
                        self.sessions.remove(&message.session_id);
                        Err(e)
                    }
                }
            }
            PeerMessageType::WaitForData => {
                let connection = self.require_session(&message.session_id)?;
                let data = connection
                    .wait_for_data(self.options.max_wait_for_data)
                    .await;
                Ok(ServerMessage::relay_to_peer(
                    &message.session_id,
                    data,
                    message.sequence,
                ))
            }
        }
    }

    async fn connect(&self, message: &PeerMessage) -> Result<ServerMessage, GatewayError> {
        if message.device_id.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "device id must not be empty".to_string(),
            ));
        }

        let link = self.connector.open_session(&message.device_id).await?;
        let connection =
            SessionConnection::open(link, self.closed_tx.clone(), self.options.write_timeout);
        if let Err(e) = self.sessions.insert(Arc::clone(&connection)) {
            connection.close().await;
            return Err(e);
        }

        tracing::info!(
            session_id = %connection.id(),
            device_id = %message.device_id,
            is_server_socket = connection.is_server_socket(),
            "relay session established"
        );
        Ok(ServerMessage::peer_connected(
            connection.id(),
            connection.is_server_socket(),
            message.sequence,
        ))
    }

    fn require_session(&self, session_id: &str) -> Result<Arc<SessionConnection>, GatewayError> {
        if session_id.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "session id must not be empty".to_string(),
            ));
        }
        self.sessions.lookup(session_id)
    }
}
