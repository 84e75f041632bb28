//! Durable trade store
//!
//! Trades are keyed by `(trade_id, timestamp)`. Writes replace any existing
//! record under the same key.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tradecast_core::{TradeAction, TradeKey};

/// Durable keyed store for trades
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Store a trade under `trade.key()`
    async fn put(&self, trade: &TradeAction) -> Result<(), StoreError>;
}

/// Errors that can occur during trade store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to acquire lock")]
    LockError,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Trade store backed by SQLite
///
/// rusqlite is blocking, so writes run on the blocking thread pool.
pub struct SqliteTradeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTradeStore {
    /// Open (or create) the store at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Io(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                price REAL NOT NULL,
                volume INTEGER NOT NULL,
                trader TEXT NOT NULL,
                action TEXT NOT NULL,
                PRIMARY KEY (trade_id, timestamp)
            );

            CREATE INDEX IF NOT EXISTS idx_trades_trader
            ON trades(trader, timestamp);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn insert(conn: &Connection, trade: &TradeAction) -> Result<(), StoreError> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO trades (trade_id, timestamp, price, volume, trader, action)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                trade.id,
                trade.timestamp,
                trade.price,
                trade.volume,
                trade.trader,
                trade.action,
            ],
        )?;
        Ok(())
    }

    /// Look up a stored trade by key
    pub fn get(&self, key: &TradeKey) -> Result<Option<TradeAction>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;

        let trade = conn
            .query_row(
                r#"
                SELECT trade_id, timestamp, price, volume, trader, action
                FROM trades
                WHERE trade_id = ?1 AND timestamp = ?2
                "#,
                params![key.trade_id, key.timestamp],
                |row| {
                    Ok(TradeAction {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        price: row.get(2)?,
                        volume: row.get(3)?,
                        trader: row.get(4)?,
                        action: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(trade)
    }

    /// Total number of stored trades
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn put(&self, trade: &TradeAction) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let trade = trade.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::LockError)?;
            Self::insert(&conn, &trade)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

impl std::fmt::Debug for SqliteTradeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTradeStore").finish()
    }
}

/// In-memory trade store
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    trades: parking_lot::Mutex<HashMap<TradeKey, TradeAction>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TradeKey) -> Option<TradeAction> {
        self.trades.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.trades.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.lock().is_empty()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn put(&self, trade: &TradeAction) -> Result<(), StoreError> {
        self.trades.lock().insert(trade.key(), trade.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_trade(id: &str, timestamp: &str, price: f64) -> TradeAction {
        TradeAction {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            price,
            volume: 100,
            trader: "trader1".to_string(),
            action: "buy".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_and_retrieve_trade() {
        let store = SqliteTradeStore::open_in_memory().unwrap();

        let trade = create_test_trade("1", "2024-01-01T00:00:00Z", 0.55);
        store.put(&trade).await.unwrap();

        let stored = store.get(&trade.key()).unwrap();
        assert_eq!(stored, Some(trade));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_key_includes_timestamp() {
        let store = SqliteTradeStore::open_in_memory().unwrap();

        store
            .put(&create_test_trade("1", "2024-01-01T00:00:00Z", 0.50))
            .await
            .unwrap();
        store
            .put(&create_test_trade("1", "2024-01-01T00:00:01Z", 0.60))
            .await
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_key_replaces_record() {
        let store = SqliteTradeStore::open_in_memory().unwrap();

        store
            .put(&create_test_trade("1", "2024-01-01T00:00:00Z", 0.50))
            .await
            .unwrap();
        let replacement = create_test_trade("1", "2024-01-01T00:00:00Z", 0.75);
        store.put(&replacement).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(&replacement.key()).unwrap().unwrap().price, 0.75);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trades.db");

        let store = SqliteTradeStore::open(&path).unwrap();
        store
            .put(&create_test_trade("1", "2024-01-01T00:00:00Z", 0.50))
            .await
            .unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTradeStore::new();
        let trade = create_test_trade("1", "2024-01-01T00:00:00Z", 0.55);

        store.put(&trade).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&trade.key()), Some(trade));
    }
}
