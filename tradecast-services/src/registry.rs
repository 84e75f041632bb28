//! Connection registry
//!
//! Holds the set of open subscriber connections. Membership here is the
//! only record of whether a client is still reachable.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use tradecast_core::TransportError;

/// Unique identifier for a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound half of a client transport
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Write one text message to the client
    async fn send_text(&self, payload: &str) -> Result<(), TransportError>;

    /// Close the transport. Errors are ignored, the peer may already be gone.
    async fn close(&self);
}

/// A live subscriber: its id plus the handle used to write to it
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    sink: Arc<dyn ClientSink>,
}

impl Connection {
    pub fn new(id: ConnectionId, sink: Arc<dyn ClientSink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn send_text(&self, payload: &str) -> Result<(), TransportError> {
        self.sink.send_text(payload).await
    }

    pub async fn close(&self) {
        self.sink.close().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Concurrency-safe set of open connections
///
/// `add`, `remove` and `snapshot` all take the same lock, so they are
/// serialized against each other. The lock is never held across an await.
pub struct ConnectionRegistry {
    /// Next connection ID to assign
    next_id: AtomicU64,
    connections: Mutex<BTreeMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: Mutex::new(BTreeMap::new()),
        }
    }

    /// Generate a new unique connection ID
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn add(&self, connection: Connection) {
        let id = connection.id();
        let total = {
            let mut connections = self.connections.lock();
            connections.insert(id, connection);
            connections.len()
        };
        debug!("Registered {} ({} open)", id, total);
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().remove(&id).is_some();
        if removed {
            debug!("Unregistered {}", id);
        }
        removed
    }

    /// Copy of the current members, in connection-id order
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("open_connections", &self.len())
            .finish()
    }
}
