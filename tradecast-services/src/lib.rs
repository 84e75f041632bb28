//! Hub services for Tradecast
//!
//! This crate provides the connection registry, the per-connection ingest
//! loop, event enrichment, the broadcast hub and the persistence pipeline,
//! plus the collaborator interfaces they depend on.

pub mod config;
pub mod enricher;
pub mod hub;
pub mod ingest;
pub mod oplog;
pub mod persistence;
pub mod registry;
pub mod state;

pub use config::{
    load_env_file, ConfigError, EnvParameterResolver, HubConfig, ParameterResolver,
    StaticParameterResolver,
};
pub use enricher::{Enricher, TradeIdGenerator};
pub use hub::{BroadcastHub, BroadcastReport};
pub use ingest::{IngestOutcome, Termination};
pub use oplog::{
    FileOperationalLog, LogEntry, MemoryOperationalLog, OpLogError, OperationalLog, OpsLogger,
};
pub use persistence::{
    EnqueueError, HttpTopicPublisher, MemoryTopicPublisher, MemoryTradeStore, PersistOutcome,
    PersistenceConfig, PersistencePipeline, PersistenceQueue, PersistenceWorkers, PublishError,
    SqliteTradeStore, StoreError, TopicPublisher, TradeStore,
};
pub use registry::{ClientSink, Connection, ConnectionId, ConnectionRegistry};
pub use state::HubState;
