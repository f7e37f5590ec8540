//! WebSocket connection handling

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{Sink, SinkExt, StreamExt};
use gazelog_core::{Effect, InboundMessage};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::{AppState, ServerError};

use super::peers::PeerId;

/// Longest prefix of an inbound message written to the log
const LOG_PREVIEW_CHARS: usize = 150;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let (peer_id, outbound) = state.peers.register(addr).await;

    info!("Client connected: {}", addr);

    let writer = tokio::spawn(drain_outbound(sender, outbound, addr));

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_text_message(text.to_string(), peer_id, addr, &state).await
                {
                    error!("Error processing message from {}, closing connection: {}", addr, e);
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!("Client {} sent close frame: {:?}", addr, frame);
                break;
            }
            Ok(_) => {
                // Binary frames are ignored; pings are answered by the socket itself
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", addr, e);
                break;
            }
        }
    }

    state.peers.deregister(peer_id).await;
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", addr, e);
    }

    info!(
        "Connection closed for {}. Remaining clients: {}",
        addr,
        state.peers.count().await
    );
}

/// Write queued messages (acknowledgements and relays) to the socket
///
/// Stops once the queue closes or the connection turns out to be gone.
/// Dropping the queue's receiver makes the next relay deregister the peer;
/// any other send failure is logged and the peer kept.
async fn drain_outbound<S>(
    mut sender: S,
    mut outbound: UnboundedReceiver<Message>,
    addr: SocketAddr,
) where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sender.send(message).await {
            if is_connection_closed(&e) {
                info!("Connection to {} is closed, stopping writer: {}", addr, e);
                return;
            }
            warn!("Error sending message to {}: {}", addr, e);
        }
    }
    let _ = sender.close().await;
}

/// Whether a send error means the peer's connection is gone
fn is_connection_closed(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::UnexpectedEof
            );
        }
        source = err.source();
    }

    // tungstenite reports a finished close handshake without an io error
    let text = error.to_string();
    text.contains("Connection closed") || text.contains("closed connection")
}

/// Handle a text message from the client
///
/// Malformed messages are logged and dropped. An error return means the
/// connection itself is unusable and should be closed.
async fn handle_text_message(
    text: String,
    peer_id: PeerId,
    addr: SocketAddr,
    state: &Arc<AppState>,
) -> Result<(), ServerError> {
    let arrived_at = Utc::now();
    debug!(
        "Message received from {} at {}: {}",
        addr,
        arrived_at.to_rfc3339(),
        preview(&text)
    );

    let message = match InboundMessage::parse(text, arrived_at) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding message from {}: {}", addr, e);
            return Ok(());
        }
    };

    // Merge, completion check and removal happen under one lock acquisition
    let transition = state.correlator.lock().await.handle(&message);

    for effect in transition.effects {
        match effect {
            Effect::Write(record) => {
                state.write_record(&record).await;
            }
            Effect::Forward => {
                state.peers.relay(peer_id, message.raw()).await;
            }
            Effect::Acknowledge(ack) => {
                let json = serde_json::to_string(&ack)?;
                state.peers.send_to(peer_id, Message::Text(json.into())).await?;
            }
        }
    }

    Ok(())
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let mut head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        head.push_str("...");
    }
    head
}
