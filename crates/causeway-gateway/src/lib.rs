//! causeway-gateway — the session gateway core.
//!
//! Bridges stateless HTTP request/response exchanges onto stateful,
//! long-lived relay connections: the connector opens relay sockets, each
//! session wraps one socket behind an id, the table tracks live sessions
//! across concurrent workers, and the message handler maps one peer message
//! to one server response.

pub mod connector;
pub mod error;
pub mod handler;
pub mod session;
pub mod table;

pub use connector::{ConnectError, RelayConnector, RelayLink, RelayStream, TcpRelayConnector};
pub use error::GatewayError;
pub use handler::{GatewayOptions, MessageHandler};
pub use session::{SessionConnection, SessionState};
pub use table::{spawn_reaper, SessionTable};
