//! Storage implementations.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::{SqliteConfig, StorageConfig, StorageType};
use crate::interfaces::{
    AffiliateStore, LedgerStore, OrderSource, PayoutStore, ProductCatalog, Result, SplitStore,
    StorageError,
};

pub mod mock;
pub mod schema;
pub mod sqlite;

pub use mock::MockStore;
pub use sqlite::{
    SqliteAffiliateStore, SqliteLedgerStore, SqliteOrderSource, SqlitePayoutStore,
    SqliteSplitStore,
};

/// Every store the services need, as trait objects.
#[derive(Clone)]
pub struct Stores {
    pub affiliates: Arc<dyn AffiliateStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub payouts: Arc<dyn PayoutStore>,
    pub splits: Arc<dyn SplitStore>,
    pub orders: Arc<dyn OrderSource>,
    pub products: Arc<dyn ProductCatalog>,
}

impl Stores {
    /// All stores backed by one in-memory mock.
    pub fn from_mock(store: Arc<MockStore>) -> Self {
        Self {
            affiliates: store.clone(),
            ledger: store.clone(),
            payouts: store.clone(),
            splits: store.clone(),
            orders: store.clone(),
            products: store,
        }
    }

    /// All stores over one SQLite pool, schema created.
    pub async fn from_sqlite_pool(pool: SqlitePool) -> Result<Self> {
        let affiliates = SqliteAffiliateStore::new(pool.clone());
        affiliates.init().await?;
        let ledger = SqliteLedgerStore::new(pool.clone());
        ledger.init().await?;
        let payouts = SqlitePayoutStore::new(pool.clone());
        payouts.init().await?;
        let splits = SqliteSplitStore::new(pool.clone());
        splits.init().await?;
        let orders = Arc::new(SqliteOrderSource::new(pool));
        orders.init().await?;

        Ok(Self {
            affiliates: Arc::new(affiliates),
            ledger: Arc::new(ledger),
            payouts: Arc::new(payouts),
            splits: Arc::new(splits),
            orders: orders.clone(),
            products: orders,
        })
    }
}

/// Open a SQLite pool for the configured path.
///
/// An in-memory database lives only as long as its one connection, so the
/// pool is pinned to a single connection that never expires.
pub async fn connect_sqlite(config: &SqliteConfig) -> Result<SqlitePool> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

    if config.is_in_memory() {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        return Ok(pool);
    }

    if let Some(parent) = std::path::Path::new(&config.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Stores> {
    match config.storage_type {
        StorageType::Sqlite => {
            info!(path = %config.sqlite.path, "storage: sqlite");
            let pool = connect_sqlite(&config.sqlite).await?;
            Stores::from_sqlite_pool(pool).await
        }
        StorageType::Memory => {
            info!("storage: memory");
            Ok(Stores::from_mock(Arc::new(MockStore::new())))
        }
    }
}
