//! One bridged relay connection.
//!
//! A SessionConnection owns the relay socket behind a session id and makes
//! it look synchronous to HTTP workers: sends are serialized writes, polls
//! are deadline-bounded waits on an inbound channel fed by a background
//! reader task. Closing — whether peer-requested, error-driven, or detected
//! by the reader at remote EOF — runs exactly once and publishes the session
//! id on the closure channel so the registry can deregister it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connector::{RelayLink, RelayStream};
use crate::error::GatewayError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Session lifecycle. Transitions only move forward:
/// Open → Closing → Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

pub struct SessionConnection {
    id: String,
    is_server_socket: bool,
    state: AtomicU8,
    writer: Mutex<WriteHalf<RelayStream>>,
    /// Inbound chunks from the reader task. The receiver is exclusive, so a
    /// delivered chunk goes to exactly one waiter.
    inbound: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    /// Cancelled on close; releases any blocked waiter and stops the reader.
    closed: CancellationToken,
    closed_tx: mpsc::UnboundedSender<String>,
    write_timeout: Duration,
}

impl std::fmt::Debug for SessionConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConnection")
            .field("id", &self.id)
            .field("is_server_socket", &self.is_server_socket)
            .finish_non_exhaustive()
    }
}

impl SessionConnection {
    /// Take ownership of an established relay link: assign a fresh session
    /// id, split the stream, and spawn the background reader.
    pub fn open(
        link: RelayLink,
        closed_tx: mpsc::UnboundedSender<String>,
        write_timeout: Duration,
    ) -> Arc<Self> {
        let (read_half, write_half) = tokio::io::split(link.stream);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            id: causeway_core::id::session_id(),
            is_server_socket: link.is_server_socket,
            state: AtomicU8::new(SessionState::Open as u8),
            writer: Mutex::new(write_half),
            inbound: Mutex::new(inbound_rx),
            closed: CancellationToken::new(),
            closed_tx,
            write_timeout,
        });

        tokio::spawn(Self::read_loop(
            Arc::clone(&connection),
            read_half,
            inbound_tx,
        ));
        connection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_server_socket(&self) -> bool {
        self.is_server_socket
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Write bytes to the relay socket. Writes for one session serialize on
    /// the writer lock, so concurrent sends never interleave mid-payload.
    pub async fn send(&self, data: &[u8]) -> Result<(), GatewayError> {
        if self.closed.is_cancelled() {
            return Err(GatewayError::IoFailure("session is closed".to_string()));
        }
        let mut writer = self.writer.lock().await;
        let io = async {
            writer.write_all(data).await?;
            writer.flush().await
        };
        match tokio::time::timeout(self.write_timeout, io).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GatewayError::IoFailure(e.to_string())),
            Err(_) => Err(GatewayError::IoFailure(format!(
                "write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }

    /// Wait up to `max_wait` for inbound relay data.
    ///
    /// Returns the chunks accumulated so far, coalesced in arrival order.
    /// Empty result means timeout or session closed — the normal "nothing to
    /// report yet" outcome of polling, not an error.
    pub async fn wait_for_data(&self, max_wait: Duration) -> Bytes {
        let deadline = Instant::now() + max_wait;
        let mut inbound = match tokio::time::timeout_at(deadline, self.inbound.lock()).await {
            Ok(guard) => guard,
            Err(_) => return Bytes::new(),
        };

        let mut out = BytesMut::new();
        drain_ready(&mut inbound, &mut out);
        if !out.is_empty() {
            return out.freeze();
        }

        tokio::select! {
            _ = self.closed.cancelled() => Bytes::new(),
            result = tokio::time::timeout_at(deadline, inbound.recv()) => match result {
                Ok(Some(first)) => {
                    out.extend_from_slice(&first);
                    drain_ready(&mut inbound, &mut out);
                    out.freeze()
                }
                // Reader gone or deadline hit — nothing to report.
                Ok(None) | Err(_) => Bytes::new(),
            }
        }
    }

    /// Tear the session down. Idempotent; only the first caller runs the
    /// close sequence and emits the closure notification.
    pub async fn close(&self) {
        let begun = self
            .state
            .compare_exchange(
                SessionState::Open as u8,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !begun {
            return;
        }

        // Wakes any blocked waiter and stops the reader task.
        self.closed.cancel();

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(session_id = %self.id, error = %e, "relay socket shutdown failed");
            }
        }

        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
        let _ = self.closed_tx.send(self.id.clone());
        tracing::debug!(session_id = %self.id, "session closed");
    }

    /// Background reader: relay socket → inbound channel, until EOF, error,
    /// or close. Remote closure funnels into the same close path.
    async fn read_loop(
        connection: Arc<Self>,
        mut read_half: ReadHalf<RelayStream>,
        inbound_tx: mpsc::UnboundedSender<Bytes>,
    ) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = connection.closed.cancelled() => break,
                result = read_half.read(&mut buf) => match result {
                    Ok(0) => {
                        tracing::debug!(session_id = %connection.id, "relay socket closed by remote");
                        break;
                    }
                    Ok(n) => {
                        if inbound_tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %connection.id, error = %e, "relay socket read failed");
                        break;
                    }
                }
            }
        }
        drop(inbound_tx);
        connection.close().await;
    }
}

fn drain_ready(inbound: &mut mpsc::UnboundedReceiver<Bytes>, out: &mut BytesMut) {
    while let Ok(chunk) = inbound.try_recv() {
        out.extend_from_slice(&chunk);
    }
}
