//! Card inventory wrapper with injectable storage failures.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::inventory::{
    Card, CardInventory, DeliveryRecord, InventoryError, PoolStats, SqliteCardStore,
};

/// In-memory card store whose ledger reads and writes can be made to fail.
///
/// Everything else is delegated to a real [`SqliteCardStore`], so claims
/// and counts behave exactly as in production.
pub struct MockCardInventory {
    inner: SqliteCardStore,
    fail_lookups: AtomicBool,
    fail_commits: AtomicBool,
}

impl MockCardInventory {
    pub fn new() -> Result<Self, InventoryError> {
        Ok(Self {
            inner: SqliteCardStore::in_memory()?,
            fail_lookups: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        })
    }

    /// Make `is_delivered` fail until reset.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Make `commit_delivery` fail until reset.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn injected(op: &str) -> InventoryError {
        InventoryError::Database(format!("disk I/O error during {}", op))
    }
}

impl CardInventory for MockCardInventory {
    fn import_codes(&self, pool_key: &str, source: &mut dyn BufRead) -> Result<u64, InventoryError> {
        self.inner.import_codes(pool_key, source)
    }

    fn allocate(
        &self,
        pool_key: &str,
        order_id: &str,
        quantity: u32,
    ) -> Result<Vec<Card>, InventoryError> {
        self.inner.allocate(pool_key, order_id, quantity)
    }

    fn rollback(&self, order_id: &str) -> Result<u64, InventoryError> {
        self.inner.rollback(order_id)
    }

    fn is_delivered(&self, order_id: &str) -> Result<bool, InventoryError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Self::injected("is_delivered"));
        }
        self.inner.is_delivered(order_id)
    }

    fn commit_delivery(
        &self,
        order_id: &str,
        card_count: u32,
        message: &str,
    ) -> Result<DeliveryRecord, InventoryError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Self::injected("commit_delivery"));
        }
        self.inner.commit_delivery(order_id, card_count, message)
    }

    fn get_delivery(&self, order_id: &str) -> Result<Option<DeliveryRecord>, InventoryError> {
        self.inner.get_delivery(order_id)
    }

    fn cards_for_order(&self, order_id: &str) -> Result<Vec<Card>, InventoryError> {
        self.inner.cards_for_order(order_id)
    }

    fn available(&self, pool_key: &str) -> Result<u64, InventoryError> {
        self.inner.available(pool_key)
    }

    fn pool_stats(&self) -> Result<Vec<PoolStats>, InventoryError> {
        self.inner.pool_stats()
    }

    fn release_orphaned_claims(&self) -> Result<u64, InventoryError> {
        self.inner.release_orphaned_claims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_failures_are_injected_and_reset() {
        let store = MockCardInventory::new().unwrap();
        store.import_codes("GPT", &mut Cursor::new("C1\n")).unwrap();

        store.set_fail_lookups(true);
        assert!(matches!(
            store.is_delivered("A1"),
            Err(InventoryError::Database(_))
        ));
        store.set_fail_lookups(false);
        assert!(!store.is_delivered("A1").unwrap());

        store.set_fail_commits(true);
        assert!(store.commit_delivery("A1", 1, "msg").is_err());
        assert_eq!(store.available("GPT").unwrap(), 1);
    }
}
