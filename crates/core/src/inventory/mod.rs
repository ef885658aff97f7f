//! Card pools and the delivered-orders ledger.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteCardStore;
pub use store::{CardInventory, InventoryError};
pub use types::{Card, DeliveryRecord, LedgerDetail, PoolStats};
