//! WebSocket route handler
//!
//! Handles the WebSocket upgrade and adapts the axum socket to the hub's
//! transport interfaces.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite;
use tracing::debug;
use tradecast_core::TransportError;
use tradecast_services::ClientSink;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();

    let sink = Arc::new(AxumClientSink {
        sender: Mutex::new(sender),
    });
    let reader = receiver.map(|result| result.map(into_tungstenite));

    let outcome = state.hub.handle_connection(reader, sink).await;
    debug!(
        "Connection finished: {} accepted, {} rejected, {:?}",
        outcome.accepted, outcome.rejected, outcome.termination
    );
}

/// Outbound half of an axum WebSocket
struct AxumClientSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ClientSink for AxumClientSink {
    async fn send_text(&self, payload: &str) -> Result<(), TransportError> {
        self.sender
            .lock()
            .await
            .send(Message::Text(payload.to_string().into()))
            .await
            .map_err(|e| TransportError::write(e.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.close().await;
    }
}

/// Convert an axum message into the tungstenite form the hub reads
fn into_tungstenite(msg: Message) -> tungstenite::Message {
    match msg {
        Message::Text(text) => tungstenite::Message::Text(text.to_string().into()),
        Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
        Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
        Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
        Message::Close(_) => tungstenite::Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[test]
    fn test_text_and_binary_survive_conversion() {
        match into_tungstenite(Message::Text("{\"price\":1}".into())) {
            tungstenite::Message::Text(text) => assert_eq!(text.as_str(), "{\"price\":1}"),
            other => panic!("unexpected message: {:?}", other),
        }

        match into_tungstenite(Message::Binary(Bytes::from_static(b"abc"))) {
            tungstenite::Message::Binary(data) => assert_eq!(&data[..], b"abc"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_close_maps_to_close() {
        assert!(matches!(
            into_tungstenite(Message::Close(None)),
            tungstenite::Message::Close(None)
        ));
    }
}
