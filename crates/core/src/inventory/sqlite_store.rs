//! SQLite-backed card inventory.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Card, CardInventory, DeliveryRecord, InventoryError, LedgerDetail, PoolStats};
use crate::config::DatabaseConfig;
use crate::metrics;

const CARD_COLUMNS: &str =
    "id, pool_key, code, is_used, used_by_order_id, created_at, used_at";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed card inventory.
///
/// Allocation, rollback and orphan recovery run inside `BEGIN IMMEDIATE`
/// transactions, so the select-then-claim sequence holds the database write
/// lock for its whole duration. Other processes opening the same file wait
/// on the busy timeout instead of interleaving.
pub struct SqliteCardStore {
    conn: Mutex<Connection>,
    ledger_detail: LedgerDetail,
}

impl SqliteCardStore {
    /// Open (or create) a store at `path` with default settings.
    pub fn new(path: &Path) -> Result<Self, InventoryError> {
        Self::open(path, LedgerDetail::default(), DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the store described by the database configuration.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, InventoryError> {
        Self::open(
            &config.path,
            config.ledger_detail,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// Open (or create) a store, creating parent directories and tables if needed.
    pub fn open(
        path: &Path,
        ledger_detail: LedgerDetail,
        busy_timeout: Duration,
    ) -> Result<Self, InventoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened card store");
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            ledger_detail,
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, InventoryError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ledger_detail: LedgerDetail::default(),
        })
    }

    /// Change how much of each delivery is kept in the ledger.
    pub fn with_ledger_detail(mut self, ledger_detail: LedgerDetail) -> Self {
        self.ledger_detail = ledger_detail;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), InventoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool_key TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                is_used INTEGER NOT NULL DEFAULT 0,
                used_by_order_id TEXT,
                created_at TEXT NOT NULL,
                used_at TEXT,
                CHECK ((is_used = 0) = (used_by_order_id IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_cards_pool_unused ON cards(pool_key, is_used, id);
            CREATE INDEX IF NOT EXISTS idx_cards_used_by ON cards(used_by_order_id);

            CREATE TABLE IF NOT EXISTS delivery_records (
                order_id TEXT PRIMARY KEY,
                delivered_at TEXT NOT NULL,
                card_count INTEGER NOT NULL,
                message TEXT
            );
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, InventoryError> {
        self.conn
            .lock()
            .map_err(|_| InventoryError::Database("card store lock poisoned".to_string()))
    }

    fn is_committed(conn: &Connection, order_id: &str) -> Result<bool, InventoryError> {
        let found = conn
            .query_row(
                "SELECT 1 FROM delivery_records WHERE order_id = ?1",
                params![order_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn claimed_count(conn: &Connection, order_id: &str) -> Result<i64, InventoryError> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE used_by_order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<Card> {
        let used_at: Option<String> = row.get(6)?;
        Ok(Card {
            id: row.get(0)?,
            pool_key: row.get(1)?,
            code: row.get(2)?,
            is_used: row.get(3)?,
            used_by_order_id: row.get(4)?,
            created_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
            used_at: used_at.map(|s| parse_timestamp(6, &s)).transpose()?,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DeliveryRecord> {
        Ok(DeliveryRecord {
            order_id: row.get(0)?,
            delivered_at: parse_timestamp(1, &row.get::<_, String>(1)?)?,
            card_count: row.get(2)?,
            message: row.get(3)?,
        })
    }
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl CardInventory for SqliteCardStore {
    fn import_codes(&self, pool_key: &str, source: &mut dyn BufRead) -> Result<u64, InventoryError> {
        if pool_key.trim().is_empty() {
            return Err(InventoryError::InvalidPoolKey);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0u64;
        let mut seen = 0u64;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO cards (pool_key, code, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for line in source.lines() {
                let line = line?;
                let code = line.trim();
                if code.is_empty() {
                    continue;
                }
                seen += 1;
                inserted += stmt.execute(params![pool_key, code, now])? as u64;
            }
        }

        tx.commit()?;
        debug!(pool = pool_key, seen, inserted, "Imported codes");
        Ok(inserted)
    }

    fn allocate(
        &self,
        pool_key: &str,
        order_id: &str,
        quantity: u32,
    ) -> Result<Vec<Card>, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::is_committed(&tx, order_id)? {
            return Err(InventoryError::AlreadyCommitted(order_id.to_string()));
        }
        if Self::claimed_count(&tx, order_id)? > 0 {
            return Err(InventoryError::ClaimInFlight(order_id.to_string()));
        }

        let mut cards: Vec<Card> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM cards WHERE pool_key = ?1 AND is_used = 0 ORDER BY id ASC LIMIT ?2",
                CARD_COLUMNS
            ))?;
            let rows = stmt.query_map(params![pool_key, quantity], Self::row_to_card)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        if cards.len() < quantity as usize {
            // Dropping the transaction rolls it back; nothing was written.
            return Err(InventoryError::InsufficientInventory {
                pool_key: pool_key.to_string(),
                requested: quantity,
                available: cards.len() as u32,
            });
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        {
            let mut update = tx.prepare(
                "UPDATE cards SET is_used = 1, used_by_order_id = ?1, used_at = ?2 WHERE id = ?3 AND is_used = 0",
            )?;
            for card in &mut cards {
                if update.execute(params![order_id, now_str, card.id])? != 1 {
                    return Err(InventoryError::Database(format!(
                        "card {} was claimed concurrently",
                        card.id
                    )));
                }
                card.is_used = true;
                card.used_by_order_id = Some(order_id.to_string());
                card.used_at = Some(now);
            }
        }

        tx.commit()?;
        metrics::CARDS_ALLOCATED.inc_by(cards.len() as u64);
        debug!(pool = pool_key, order_id, count = cards.len(), "Allocated cards");
        Ok(cards)
    }

    fn rollback(&self, order_id: &str) -> Result<u64, InventoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::is_committed(&tx, order_id)? {
            return Err(InventoryError::AlreadyCommitted(order_id.to_string()));
        }

        let released = tx.execute(
            "UPDATE cards SET is_used = 0, used_by_order_id = NULL, used_at = NULL WHERE used_by_order_id = ?1",
            params![order_id],
        )? as u64;

        tx.commit()?;
        metrics::CARDS_RELEASED.inc_by(released);
        debug!(order_id, released, "Rolled back claimed cards");
        Ok(released)
    }

    fn is_delivered(&self, order_id: &str) -> Result<bool, InventoryError> {
        let conn = self.lock()?;
        Self::is_committed(&conn, order_id)
    }

    fn commit_delivery(
        &self,
        order_id: &str,
        card_count: u32,
        message: &str,
    ) -> Result<DeliveryRecord, InventoryError> {
        let conn = self.lock()?;

        let record = DeliveryRecord {
            order_id: order_id.to_string(),
            delivered_at: Utc::now(),
            card_count,
            message: match self.ledger_detail {
                LedgerDetail::Full => Some(message.to_string()),
                LedgerDetail::Minimal => None,
            },
        };

        conn.execute(
            "INSERT OR REPLACE INTO delivery_records (order_id, delivered_at, card_count, message) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.order_id,
                record.delivered_at.to_rfc3339(),
                record.card_count,
                record.message,
            ],
        )?;

        Ok(record)
    }

    fn get_delivery(&self, order_id: &str) -> Result<Option<DeliveryRecord>, InventoryError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT order_id, delivered_at, card_count, message FROM delivery_records WHERE order_id = ?1",
                params![order_id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn cards_for_order(&self, order_id: &str) -> Result<Vec<Card>, InventoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE used_by_order_id = ?1 ORDER BY id ASC",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![order_id], Self::row_to_card)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn available(&self, pool_key: &str) -> Result<u64, InventoryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE pool_key = ?1 AND is_used = 0",
            params![pool_key],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn pool_stats(&self) -> Result<Vec<PoolStats>, InventoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT pool_key, COUNT(*), SUM(CASE WHEN is_used = 0 THEN 1 ELSE 0 END)
             FROM cards GROUP BY pool_key ORDER BY pool_key ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let total: i64 = row.get(1)?;
            let unused: i64 = row.get(2)?;
            Ok(PoolStats {
                pool_key: row.get(0)?,
                total: total as u64,
                unused: unused as u64,
                used: (total - unused) as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn release_orphaned_claims(&self) -> Result<u64, InventoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let released = tx.execute(
            "UPDATE cards SET is_used = 0, used_by_order_id = NULL, used_at = NULL
             WHERE is_used = 1
               AND used_by_order_id NOT IN (SELECT order_id FROM delivery_records)",
            [],
        )? as u64;

        tx.commit()?;
        metrics::CARDS_RELEASED.inc_by(released);
        debug!(released, "Released orphaned claims");
        Ok(released)
    }
}
