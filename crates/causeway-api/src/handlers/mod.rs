//! HTTP handlers — the binary relay exchange plus gateway observability.

pub mod relay;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use causeway_gateway::{MessageHandler, SessionTable};

#[derive(Clone)]
pub struct ApiState {
    pub handler: Arc<MessageHandler>,
    pub sessions: SessionTable,
    /// When the gateway came up — reported as uptime in /api/status.
    pub started_at: Instant,
}

// Re-export handler functions for use in router setup.
pub use relay::handle_relay;
pub use status::handle_status;
