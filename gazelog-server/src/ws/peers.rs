//! Registry of connected peers and the broadcast relay
//!
//! Every connection gets an unbounded outbound queue drained by its own
//! writer task. Relaying only enqueues, so a slow peer never holds up the
//! sender or the other peers.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ws::Message;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ServerError;

/// Identifier assigned to a connection when it registers
pub type PeerId = Uuid;

struct Peer {
    addr: SocketAddr,
    tx: UnboundedSender<Message>,
}

/// Counts from one relay pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Peers the message was queued for
    pub delivered: usize,
    /// Peers dropped because their connection had closed
    pub removed: usize,
}

/// All currently connected peers
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, Peer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning its id and outbound queue
    pub async fn register(&self, addr: SocketAddr) -> (PeerId, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.peers.write().await.insert(id, Peer { addr, tx });
        (id, rx)
    }

    /// Remove a connection; its writer drains and stops once the queue closes
    pub async fn deregister(&self, id: PeerId) -> bool {
        self.peers.write().await.remove(&id).is_some()
    }

    /// Number of connected peers
    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn contains(&self, id: PeerId) -> bool {
        self.peers.read().await.contains_key(&id)
    }

    /// Queue a message for one peer
    pub async fn send_to(&self, id: PeerId, message: Message) -> Result<(), ServerError> {
        let tx = self
            .peers
            .read()
            .await
            .get(&id)
            .map(|peer| peer.tx.clone())
            .ok_or_else(|| ServerError::PeerClosed(id.to_string()))?;

        tx.send(message)
            .map_err(|_| ServerError::PeerClosed(id.to_string()))
    }

    /// Queue raw text for every peer except `from`
    ///
    /// Peers whose queue has closed are deregistered.
    pub async fn relay(&self, from: PeerId, raw: &str) -> RelayReport {
        let targets: Vec<(PeerId, SocketAddr, UnboundedSender<Message>)> = self
            .peers
            .read()
            .await
            .iter()
            .filter(|(id, _)| **id != from)
            .map(|(id, peer)| (*id, peer.addr, peer.tx.clone()))
            .collect();

        let mut report = RelayReport::default();
        for (id, addr, tx) in targets {
            if tx.send(Message::Text(raw.to_string().into())).is_ok() {
                report.delivered += 1;
            } else {
                info!("Removing closed connection during relay: {}", addr);
                self.deregister(id).await;
                report.removed += 1;
            }
        }

        debug!(
            "Relayed message to {} peers ({} removed)",
            report.delivered, report.removed
        );
        report
    }
}
