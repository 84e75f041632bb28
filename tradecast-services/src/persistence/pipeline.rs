//! Bounded persistence queue and worker pool
//!
//! `PersistenceQueue::persist` never waits: when the queue is full the
//! trade is dropped and reported. A fixed number of workers drain the
//! queue, each running store-then-publish for one trade at a time.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tradecast_core::TradeAction;

use super::publisher::TopicPublisher;
use super::store::TradeStore;
use crate::oplog::OpsLogger;

/// Configuration for the persistence worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Number of concurrent store/publish workers
    pub workers: usize,
    /// Trades that may wait for a worker before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// What happened to a single trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Stored and published
    Published,
    /// Stored, but the publish failed
    PublishFailed,
    /// Store failed, publish skipped
    StoreFailed,
}

/// Errors returned when a trade cannot be queued
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("Persistence queue full (capacity {capacity}), dropped trade {trade_id}")]
    QueueFull { trade_id: String, capacity: usize },

    #[error("Persistence workers stopped, dropped trade {trade_id}")]
    Closed { trade_id: String },
}

/// Store-then-publish step
pub struct PersistencePipeline {
    store: Arc<dyn TradeStore>,
    publisher: Arc<dyn TopicPublisher>,
    ops: OpsLogger,
}

impl PersistencePipeline {
    pub fn new(
        store: Arc<dyn TradeStore>,
        publisher: Arc<dyn TopicPublisher>,
        ops: OpsLogger,
    ) -> Self {
        Self {
            store,
            publisher,
            ops,
        }
    }

    /// Store a trade, then publish it if the store succeeded
    pub async fn process(&self, trade: &TradeAction) -> PersistOutcome {
        if let Err(e) = self.store.put(trade).await {
            self.ops
                .error(format!("Error saving trade {}: {}", trade.key(), e))
                .await;
            return PersistOutcome::StoreFailed;
        }

        let payload = match serde_json::to_vec(trade) {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                self.ops
                    .error(format!("Error serializing trade {}: {}", trade.id, e))
                    .await;
                return PersistOutcome::PublishFailed;
            }
        };

        if let Err(e) = self.publisher.publish(payload).await {
            self.ops
                .error(format!("Error publishing trade {}: {}", trade.id, e))
                .await;
            return PersistOutcome::PublishFailed;
        }

        debug!("Persisted and published trade {}", trade.id);
        PersistOutcome::Published
    }

    /// Start the worker pool
    ///
    /// Workers stop once every `PersistenceQueue` clone is dropped and the
    /// queue is drained.
    pub fn spawn(
        self: Arc<Self>,
        config: &PersistenceConfig,
    ) -> (PersistenceQueue, PersistenceWorkers) {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel::<TradeAction>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..config.workers.max(1))
            .map(|worker| {
                let pipeline = Arc::clone(&self);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        match next {
                            Some(trade) => {
                                pipeline.process(&trade).await;
                            }
                            None => break,
                        }
                    }
                    debug!("Persistence worker {} stopped", worker);
                })
            })
            .collect::<Vec<_>>();

        info!(
            "Started {} persistence worker(s), queue capacity {}",
            handles.len(),
            capacity
        );

        (PersistenceQueue { tx, capacity }, PersistenceWorkers { handles })
    }
}

impl std::fmt::Debug for PersistencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistencePipeline").finish()
    }
}

/// Producer side of the persistence queue
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<TradeAction>,
    capacity: usize,
}

impl PersistenceQueue {
    /// Queue a trade for persistence without waiting
    pub fn persist(&self, trade: TradeAction) -> Result<(), EnqueueError> {
        self.tx.try_send(trade).map_err(|e| match e {
            mpsc::error::TrySendError::Full(trade) => EnqueueError::QueueFull {
                trade_id: trade.id,
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(trade) => EnqueueError::Closed { trade_id: trade.id },
        })
    }

    /// Trades currently waiting for a worker
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handles to the running persistence workers
#[derive(Debug)]
pub struct PersistenceWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl PersistenceWorkers {
    /// Wait for every worker to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Persistence worker panicked: {}", e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::MemoryOperationalLog;
    use crate::persistence::{
        MemoryTopicPublisher, MemoryTradeStore, PublishError, StoreError,
    };
    use async_trait::async_trait;

    /// Records the order of store/publish calls across both collaborators
    #[derive(Default)]
    struct CallLog {
        calls: parking_lot::Mutex<Vec<String>>,
    }

    struct ScriptedStore {
        calls: Arc<CallLog>,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl TradeStore for ScriptedStore {
        async fn put(&self, trade: &TradeAction) -> Result<(), StoreError> {
            self.calls.calls.lock().push(format!("put:{}", trade.id));
            if self.fail_ids.contains(&trade.id) {
                return Err(StoreError::Unavailable("throttled".to_string()));
            }
            Ok(())
        }
    }

    struct ScriptedPublisher {
        calls: Arc<CallLog>,
        fail: bool,
    }

    #[async_trait]
    impl TopicPublisher for ScriptedPublisher {
        async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
            let trade: TradeAction = serde_json::from_slice(&payload).unwrap();
            self.calls.calls.lock().push(format!("publish:{}", trade.id));
            if self.fail {
                return Err(PublishError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn trade(id: &str) -> TradeAction {
        TradeAction {
            id: id.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            price: 1.5,
            volume: 10,
            trader: "x".to_string(),
            action: "buy".to_string(),
        }
    }

    fn scripted(
        fail_ids: &[&str],
        fail_publish: bool,
    ) -> (PersistencePipeline, Arc<CallLog>, Arc<MemoryOperationalLog>) {
        let calls = Arc::new(CallLog::default());
        let log = Arc::new(MemoryOperationalLog::new());
        let pipeline = PersistencePipeline::new(
            Arc::new(ScriptedStore {
                calls: calls.clone(),
                fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
            }),
            Arc::new(ScriptedPublisher {
                calls: calls.clone(),
                fail: fail_publish,
            }),
            OpsLogger::new(log.clone()),
        );
        (pipeline, calls, log)
    }

    #[tokio::test]
    async fn test_store_precedes_publish() {
        let (pipeline, calls, _log) = scripted(&[], false);

        assert_eq!(pipeline.process(&trade("1")).await, PersistOutcome::Published);
        assert_eq!(*calls.calls.lock(), vec!["put:1", "publish:1"]);
    }

    #[tokio::test]
    async fn test_store_failure_skips_publish() {
        let (pipeline, calls, log) = scripted(&["1"], false);

        assert_eq!(pipeline.process(&trade("1")).await, PersistOutcome::StoreFailed);
        assert_eq!(pipeline.process(&trade("2")).await, PersistOutcome::Published);

        assert_eq!(*calls.calls.lock(), vec!["put:1", "put:2", "publish:2"]);
        assert!(log.contains("Error saving trade 1@"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_only_logged() {
        let (pipeline, calls, log) = scripted(&[], true);

        assert_eq!(
            pipeline.process(&trade("1")).await,
            PersistOutcome::PublishFailed
        );
        assert_eq!(*calls.calls.lock(), vec!["put:1", "publish:1"]);
        assert!(log.contains("Error publishing trade 1"));
    }

    #[tokio::test]
    async fn test_workers_drain_queue() {
        let store = Arc::new(MemoryTradeStore::new());
        let publisher = Arc::new(MemoryTopicPublisher::new());
        let pipeline = Arc::new(PersistencePipeline::new(
            store.clone(),
            publisher.clone(),
            OpsLogger::new(Arc::new(MemoryOperationalLog::new())),
        ));

        let (queue, workers) = pipeline.spawn(&PersistenceConfig {
            workers: 3,
            queue_capacity: 64,
        });
        assert_eq!(workers.len(), 3);

        for i in 0..50 {
            queue.persist(trade(&i.to_string())).unwrap();
        }
        drop(queue);
        workers.join().await;

        assert_eq!(store.len(), 50);
        assert_eq!(publisher.messages().len(), 50);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = PersistenceQueue { tx, capacity: 1 };

        queue.persist(trade("1")).unwrap();
        assert_eq!(queue.depth(), 1);

        let err = queue.persist(trade("2")).unwrap_err();
        assert!(matches!(err, EnqueueError::QueueFull { ref trade_id, capacity: 1 } if trade_id == "2"));
    }

    #[tokio::test]
    async fn test_closed_queue_reports_closed() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let queue = PersistenceQueue { tx, capacity: 4 };

        assert!(matches!(
            queue.persist(trade("1")),
            Err(EnqueueError::Closed { .. })
        ));
    }
}
