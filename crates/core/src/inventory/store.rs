//! Card inventory trait and error type.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{Card, DeliveryRecord, PoolStats};

/// Errors raised by inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Fewer unused codes than requested. Nothing was claimed.
    #[error("insufficient inventory in pool {pool_key}: requested {requested}, available {available}")]
    InsufficientInventory {
        pool_key: String,
        requested: u32,
        available: u32,
    },

    /// Allocation requested zero codes.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// Import targeted an empty pool key.
    #[error("pool key cannot be empty")]
    InvalidPoolKey,

    /// The order already has a delivery record; its claim is final.
    #[error("order {0} is already delivered")]
    AlreadyCommitted(String),

    /// The order holds claimed codes without a delivery record. Another
    /// orchestrator is delivering it, or a crash left the claim behind.
    #[error("order {0} already holds claimed codes")]
    ClaimInFlight(String),

    /// Failed to open an import file.
    #[error("failed to open {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read import lines.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

impl InventoryError {
    /// Whether this error leaves the store untouched and may succeed on a later pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientInventory { .. })
    }
}

impl From<rusqlite::Error> for InventoryError {
    fn from(e: rusqlite::Error) -> Self {
        InventoryError::Database(e.to_string())
    }
}

/// Durable store of card codes and the delivered-orders ledger.
///
/// Every mutating operation is atomic on its own. Implementations must make
/// [`allocate`](CardInventory::allocate) safe against concurrent callers,
/// including callers in other processes sharing the same storage.
pub trait CardInventory: Send + Sync {
    /// Insert newline-delimited codes into a pool.
    ///
    /// Blank lines are ignored and codes that already exist are skipped.
    /// Returns the number of newly inserted codes.
    fn import_codes(&self, pool_key: &str, source: &mut dyn BufRead) -> Result<u64, InventoryError>;

    /// Import codes from a text file.
    fn import_file(&self, pool_key: &str, path: &Path) -> Result<u64, InventoryError> {
        let file = File::open(path).map_err(|source| InventoryError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        self.import_codes(pool_key, &mut reader)
    }

    /// Claim exactly `quantity` unused codes of a pool for an order, oldest first.
    ///
    /// Either all requested codes are claimed or none are. Fails with
    /// [`InventoryError::ClaimInFlight`] while the order already holds codes.
    fn allocate(
        &self,
        pool_key: &str,
        order_id: &str,
        quantity: u32,
    ) -> Result<Vec<Card>, InventoryError>;

    /// Return every code claimed by an order to its pool.
    ///
    /// Returns the number of released codes; zero when nothing was claimed.
    /// Fails with [`InventoryError::AlreadyCommitted`] once the order is delivered.
    fn rollback(&self, order_id: &str) -> Result<u64, InventoryError>;

    /// Whether the ledger has a record for the order.
    fn is_delivered(&self, order_id: &str) -> Result<bool, InventoryError>;

    /// Record a confirmed delivery. Re-committing the same order overwrites.
    fn commit_delivery(
        &self,
        order_id: &str,
        card_count: u32,
        message: &str,
    ) -> Result<DeliveryRecord, InventoryError>;

    /// Fetch the ledger record for an order.
    fn get_delivery(&self, order_id: &str) -> Result<Option<DeliveryRecord>, InventoryError>;

    /// Codes currently claimed by an order, in allocation order.
    fn cards_for_order(&self, order_id: &str) -> Result<Vec<Card>, InventoryError>;

    /// Number of unused codes in a pool.
    fn available(&self, pool_key: &str) -> Result<u64, InventoryError>;

    /// Counts for every pool, ordered by pool key.
    fn pool_stats(&self) -> Result<Vec<PoolStats>, InventoryError>;

    /// Release claims held by orders that have no delivery record.
    ///
    /// Only safe while no orchestrator is delivering against this store.
    fn release_orphaned_claims(&self) -> Result<u64, InventoryError>;
}
