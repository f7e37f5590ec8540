//! WebSocket test client for protocol testing
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default wait for an expected message
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Test client speaking the card event protocol
pub struct TestClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl TestClient {
    /// Connect to the server's root WebSocket endpoint
    pub async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{}/", addr);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Send JSON message
    pub async fn send_json(&mut self, msg: &Value) {
        self.send_raw(&msg.to_string()).await;
    }

    /// Receive raw text message
    pub async fn recv_raw(&mut self) -> String {
        let next = async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return text.to_string(),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("WebSocket error: {}", e),
                    None => panic!("WebSocket closed"),
                }
            }
        };
        tokio::time::timeout(RECV_TIMEOUT, next)
            .await
            .expect("Timed out waiting for message")
    }

    /// Receive and parse JSON message
    pub async fn recv(&mut self) -> Value {
        let text = self.recv_raw().await;
        serde_json::from_str(&text).expect("Failed to parse JSON")
    }

    /// Receive with timeout, returns None if timeout
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        tokio::time::timeout(duration, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    /// Assert no message received within duration
    pub async fn expect_no_message(&mut self, duration: Duration) {
        if let Some(text) = self.recv_timeout(duration).await {
            panic!("Expected no message but received: {}", text);
        }
    }

    /// Close the connection
    pub async fn close(mut self) {
        let _ = self.sink.close().await;
    }

    /// Send a ping and count the pongs that arrive within `window`
    pub async fn ping_and_count_pongs(&mut self, window: Duration) -> usize {
        self.sink
            .send(Message::Ping(b"ping".to_vec().into()))
            .await
            .unwrap();

        let mut pongs = 0;
        let _ = tokio::time::timeout(window, async {
            while let Some(Ok(message)) = self.stream.next().await {
                if matches!(message, Message::Pong(_)) {
                    pongs += 1;
                }
            }
        })
        .await;
        pongs
    }

    /// Drop the TCP connection without a close handshake
    pub fn vanish(self) {
        drop(self);
    }

    // === Card events ===

    pub async fn reveal(&mut self, card_id: &str) {
        self.send_json(&json!({
            "event": "cardReveal",
            "cardId": card_id,
            "participant": "P01",
            "side": "left",
            "answer": "left",
            "question": "Q1",
            "difficulty": "easy"
        }))
        .await;
    }

    pub async fn robot_move(&mut self, card_id: &str, robot: &str) {
        self.send_json(&json!({
            "event": "RobotsMove",
            "cardId": card_id,
            "Robot": robot,
            "gazeDecision": "left"
        }))
        .await;
    }

    pub async fn drop_card(&mut self, card_id: &str) {
        self.send_json(&json!({
            "event": "cardDropped",
            "cardId": card_id,
            "side_choice": "left"
        }))
        .await;
    }

    /// Receive the next message and assert its status
    pub async fn expect_status(&mut self, status: &str) -> Value {
        let ack = self.recv().await;
        assert_eq!(ack["status"], status, "unexpected ack: {}", ack);
        ack
    }
}
