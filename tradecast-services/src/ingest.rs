//! Per-connection ingest loop
//!
//! Reads one message at a time, decodes it into a trade, enriches it and
//! hands it to both the persistence queue and the broadcast hub.

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tradecast_core::TradeAction;

use crate::registry::ConnectionId;
use crate::state::HubState;

/// Why an ingest loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The transport reported a read error
    ReadError,
    /// The peer closed the connection or the stream ended
    Closed,
    /// The connection was removed from the registry after a failed write
    Evicted,
}

/// Summary of a finished ingest loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Trades decoded and dispatched
    pub accepted: u64,
    /// Payloads that failed to decode
    pub rejected: u64,
    pub termination: Termination,
}

impl HubState {
    /// Run the ingest loop for one connection until its transport fails
    ///
    /// Malformed payloads are logged and skipped; they never end the loop
    /// or change registry membership. Any read failure removes the
    /// connection from the registry and ends the loop. A connection that a
    /// broadcast has already evicted stops before its next message is
    /// dispatched.
    pub async fn run_ingest_loop<R, E>(&self, id: ConnectionId, mut reader: R) -> IngestOutcome
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut accepted = 0;
        let mut rejected = 0;

        let termination = loop {
            let message = match reader.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.ops
                        .warn(format!("Client disconnected ({}): read error: {}", id, e))
                        .await;
                    break Termination::ReadError;
                }
                None => {
                    self.ops
                        .info(format!("Client disconnected ({})", id))
                        .await;
                    break Termination::Closed;
                }
            };

            if !self.registry.contains(id) {
                self.ops
                    .info(format!("Client disconnected ({}): evicted after write error", id))
                    .await;
                break Termination::Evicted;
            }

            let decoded = match &message {
                Message::Text(text) => TradeAction::decode(text.as_bytes()),
                Message::Binary(data) => TradeAction::decode(data),
                Message::Close(_) => {
                    self.ops
                        .info(format!("Client disconnected ({})", id))
                        .await;
                    break Termination::Closed;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            match decoded {
                Ok(raw) => {
                    self.dispatch(id, raw).await;
                    accepted += 1;
                }
                Err(e) => {
                    self.ops.warn(format!("{} from {}", e, id)).await;
                    rejected += 1;
                }
            }
        };

        self.registry.remove(id);

        IngestOutcome {
            accepted,
            rejected,
            termination,
        }
    }

    /// Enrich a decoded trade and hand it to persistence and broadcast
    async fn dispatch(&self, id: ConnectionId, raw: TradeAction) {
        let trade = self.enricher.enrich(&raw);
        debug!("Accepted trade {} from {}", trade.id, id);

        if let Err(e) = self.persistence.persist(trade.clone()) {
            self.ops.warn(e.to_string()).await;
        }

        self.hub.broadcast(&trade).await;
    }
}
