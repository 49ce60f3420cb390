//! Session registry — session id → live connection.
//!
//! Register on create, deregister exactly once on close: handlers remove
//! explicitly on peer-requested teardown, and the reaper removes on the
//! closure notifications sessions publish when the socket dies underneath
//! them. Removal is idempotent so the two paths compose.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::GatewayError;
use crate::session::SessionConnection;

/// Concurrent registry shared by all request-handling tasks.
/// Every entry is a session that has not yet reached Closed.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<DashMap<String, Arc<SessionConnection>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its id. Rejects an id already present.
    pub fn insert(&self, connection: Arc<SessionConnection>) -> Result<(), GatewayError> {
        use dashmap::mapref::entry::Entry;
        match self.inner.entry(connection.id().to_string()) {
            Entry::Occupied(_) => Err(GatewayError::DuplicateSession(connection.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(connection);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, session_id: &str) -> Result<Arc<SessionConnection>, GatewayError> {
        self.inner
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }

    /// Deregister a session. Removing an absent id is a no-op.
    pub fn remove(&self, session_id: &str) -> Option<Arc<SessionConnection>> {
        self.inner.remove(session_id).map(|(_, connection)| connection)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Current sessions, for status reporting.
    pub fn snapshot(&self) -> Vec<Arc<SessionConnection>> {
        self.inner
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

/// Drain closure notifications and deregister the sessions they name.
pub fn spawn_reaper(
    table: SessionTable,
    mut closed_rx: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(session_id) = closed_rx.recv().await {
            if table.remove(&session_id).is_some() {
                tracing::debug!(session_id = %session_id, "session deregistered");
            }
        }
    })
}
