//! WebSocket module for card event ingestion and relaying

mod connection;
mod peers;

pub use connection::ws_handler;
pub use peers::{PeerId, PeerRegistry, RelayReport};
