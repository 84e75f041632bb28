//! Shared hub state
//!
//! Ties the registry, enricher, broadcast hub and persistence queue
//! together and owns the connection lifecycle.

use futures_util::Stream;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

use crate::enricher::Enricher;
use crate::hub::BroadcastHub;
use crate::ingest::IngestOutcome;
use crate::oplog::OpsLogger;
use crate::persistence::PersistenceQueue;
use crate::registry::{ClientSink, Connection, ConnectionRegistry};

/// Shared state for connection handlers
#[derive(Clone)]
pub struct HubState {
    /// Open connections
    pub registry: Arc<ConnectionRegistry>,
    pub hub: BroadcastHub,
    pub enricher: Arc<Enricher>,
    /// Producer side of the persistence pipeline
    pub persistence: PersistenceQueue,
    pub ops: OpsLogger,
}

impl HubState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        persistence: PersistenceQueue,
        ops: OpsLogger,
    ) -> Self {
        Self {
            hub: BroadcastHub::new(Arc::clone(&registry), ops.clone()),
            registry,
            enricher: Arc::new(Enricher::new()),
            persistence,
            ops,
        }
    }

    /// Register a freshly upgraded connection
    pub async fn open_connection(&self, sink: Arc<dyn ClientSink>) -> Connection {
        let connection = Connection::new(self.registry.next_connection_id(), sink);
        self.registry.add(connection.clone());
        self.ops
            .info(format!(
                "New WebSocket connection established: {}",
                connection.id()
            ))
            .await;
        connection
    }

    /// Handle a new connection until its transport fails
    ///
    /// Called once the upgrade has succeeded. Registers the connection,
    /// runs its ingest loop on the current task and closes the transport
    /// when the loop ends.
    pub async fn handle_connection<R, E>(
        &self,
        reader: R,
        sink: Arc<dyn ClientSink>,
    ) -> IngestOutcome
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        let connection = self.open_connection(sink).await;
        let outcome = self.run_ingest_loop(connection.id(), reader).await;
        connection.close().await;
        outcome
    }
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("registry", &self.registry)
            .field("persistence", &self.persistence)
            .finish()
    }
}
