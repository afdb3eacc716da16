//! Uplink relay to the remote WebSocket endpoint
//!
//! - `state`: connection state cell shared with observers
//! - `transport`: connection opening (WebSocket implementation)
//! - `manager`: connection lifecycle and reconnect supervision

pub mod manager;
pub mod state;
pub mod transport;

pub use manager::ConnectionManager;
pub use state::ConnectionState;
pub use transport::WebSocketTransport;

use crate::models::OutboundMessage;

/// What the poll loop needs from the uplink
pub trait Relay: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Hand `message` to the connection; false when nothing was transmitted
    fn send(&self, message: &OutboundMessage<'_>) -> bool;
}
