//! Broadcast hub
//!
//! Fans an enriched trade out to every open connection.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};
use tradecast_core::TradeAction;

use crate::oplog::OpsLogger;
use crate::registry::ConnectionRegistry;

/// Result of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the payload was written to
    pub delivered: usize,
    /// Members whose write failed and were dropped
    pub failed: usize,
}

/// Fans trades out to the members of a connection registry
///
/// Broadcasts are serialized through a lane lock so every member sees
/// events in the order the broadcast calls were issued. Writes happen
/// sequentially on a registry snapshot: a slow member delays the others
/// within the same broadcast.
#[derive(Clone)]
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    lane: Arc<Mutex<()>>,
    ops: OpsLogger,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>, ops: OpsLogger) -> Self {
        Self {
            registry,
            lane: Arc::new(Mutex::new(())),
            ops,
        }
    }

    /// Send a trade to every open connection
    ///
    /// A member whose write fails is closed and removed from the registry;
    /// delivery to the remaining members continues.
    pub async fn broadcast(&self, trade: &TradeAction) -> BroadcastReport {
        let payload = match trade.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize trade {}: {}", trade.id, e);
                return BroadcastReport::default();
            }
        };

        let _lane = self.lane.lock().await;
        let members = self.registry.snapshot();
        let mut report = BroadcastReport::default();

        for connection in members {
            match connection.send_text(&payload).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    self.ops
                        .error(format!("WebSocket Write Error on {}: {}", connection.id(), e))
                        .await;
                    connection.close().await;
                    self.registry.remove(connection.id());
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Broadcast trade {} to {} connection(s), {} failed",
            trade.id, report.delivered, report.failed
        );
        report
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("registry", &self.registry)
            .finish()
    }
}
