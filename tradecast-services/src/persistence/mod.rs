//! Persistence pipeline
//!
//! Stores each enriched trade in a durable keyed store and, once stored,
//! republishes it to a downstream topic.

mod pipeline;
mod publisher;
mod store;

pub use pipeline::{
    EnqueueError, PersistOutcome, PersistenceConfig, PersistencePipeline, PersistenceQueue,
    PersistenceWorkers,
};
pub use publisher::{HttpTopicPublisher, MemoryTopicPublisher, PublishError, TopicPublisher};
pub use store::{MemoryTradeStore, SqliteTradeStore, StoreError, TradeStore};
