//! Causeway integration test harness.
//!
//! These tests drive the whole gateway core — decode, dispatch, session
//! lifecycle, encode — over an in-memory relay. The mock connector hands the
//! gateway one end of a duplex stream; the test keeps the other end and
//! plays the remote peer on the far side of the relay.

mod gateway;
mod sessions;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, Mutex};

use causeway_core::wire::{PeerMessage, ServerMessage, ServerMessageType};
use causeway_gateway::{
    spawn_reaper, ConnectError, GatewayOptions, MessageHandler, RelayConnector, RelayLink,
    SessionTable,
};

/// Relay connector backed by in-memory duplex streams. Each open_session
/// hands the far end to the test through a channel.
pub struct MockConnector {
    far_ends: mpsc::UnboundedSender<DuplexStream>,
    is_server_socket: bool,
    refuse: bool,
}

#[async_trait]
impl RelayConnector for MockConnector {
    async fn open_session(&self, device_id: &str) -> Result<RelayLink, ConnectError> {
        if self.refuse {
            return Err(ConnectError::Rejected(device_id.to_string()));
        }
        let (local, remote) = tokio::io::duplex(64 * 1024);
        self.far_ends.send(remote).ok();
        Ok(RelayLink {
            stream: Box::new(local),
            is_server_socket: self.is_server_socket,
        })
    }
}

pub struct Harness {
    pub handler: MessageHandler,
    pub sessions: SessionTable,
    pub far_ends: Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
}

impl Harness {
    pub fn new() -> Arc<Self> {
        Self::build(Duration::from_secs(2), false)
    }

    pub fn with_max_wait(max_wait: Duration) -> Arc<Self> {
        Self::build(max_wait, false)
    }

    pub fn refusing() -> Arc<Self> {
        Self::build(Duration::from_secs(2), true)
    }

    fn build(max_wait: Duration, refuse: bool) -> Arc<Self> {
        let (far_tx, far_rx) = mpsc::unbounded_channel();
        let sessions = SessionTable::new();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        spawn_reaper(sessions.clone(), closed_rx);

        let handler = MessageHandler::new(
            Arc::new(MockConnector {
                far_ends: far_tx,
                is_server_socket: false,
                refuse,
            }),
            sessions.clone(),
            closed_tx,
            GatewayOptions {
                max_wait_for_data: max_wait,
                write_timeout: Duration::from_secs(5),
            },
        );

        Arc::new(Self {
            handler,
            sessions,
            far_ends: Mutex::new(far_rx),
        })
    }

    /// One HTTP exchange: encode the peer message, run the handler, decode.
    pub async fn exchange(&self, message: &PeerMessage) -> ServerMessage {
        let response = self.handler.handle(&message.encode()).await;
        ServerMessage::decode(&response).expect("gateway must always answer with a well-formed message")
    }

    /// Connect to a device, returning the session id and the far end of the
    /// bridged stream.
    pub async fn connect(&self, device_id: &str) -> (String, DuplexStream) {
        let reply = self.exchange(&PeerMessage::connect(device_id)).await;
        assert_eq!(reply.message_type, ServerMessageType::PeerConnected);
        assert!(!reply.session_id.is_empty());
        let far_end = self
            .far_ends
            .lock()
            .await
            .recv()
            .await
            .expect("connector should have produced a far end");
        (reply.session_id, far_end)
    }
}

/// Assert an error reply and return its description.
pub fn error_text(reply: &ServerMessage) -> String {
    assert_eq!(reply.message_type, ServerMessageType::Error);
    String::from_utf8(reply.data.to_vec()).expect("error payload should be utf-8")
}

/// Poll until the session table is empty or the deadline passes.
pub async fn wait_until_empty(sessions: &SessionTable, deadline: Duration) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if sessions.is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sessions.is_empty()
}
