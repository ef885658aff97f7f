//! Types for the delivery orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a pass.
///
/// Per-order problems (no matching pool, empty pool, failed delivery) are
/// counted in the [`PassSummary`] instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Card store error.
    #[error("inventory error: {0}")]
    Inventory(#[from] crate::inventory::InventoryError),

    /// Order source error.
    #[error("order source error: {0}")]
    OrderSource(#[from] crate::order_source::OrderSourceError),
}

/// Terminal state of one order within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOutcome {
    /// Already in the delivery ledger.
    Skipped,
    /// No pool matched the item title.
    Unmatched,
    /// The pool had fewer unused codes than requested.
    Insufficient,
    Delivered,
    /// The channel failed; claimed codes were released.
    Failed,
}

impl OrderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Unmatched => "unmatched",
            Self::Insufficient => "insufficient",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// Counts for one pass over the pending orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub fetched: u64,
    pub skipped: u64,
    pub unmatched: u64,
    pub insufficient: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl PassSummary {
    pub fn record(&mut self, outcome: OrderOutcome) {
        let counter = match outcome {
            OrderOutcome::Skipped => &mut self.skipped,
            OrderOutcome::Unmatched => &mut self.unmatched,
            OrderOutcome::Insufficient => &mut self.insufficient,
            OrderOutcome::Delivered => &mut self.delivered,
            OrderOutcome::Failed => &mut self.failed,
        };
        *counter += 1;
    }

    /// Number of orders that reached a terminal state.
    pub fn processed(&self) -> u64 {
        self.skipped + self.unmatched + self.insufficient + self.delivered + self.failed
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the continuous loop is running.
    pub running: bool,
    /// Passes finished since startup, successful or not.
    pub passes_completed: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Summary of the last successful pass.
    pub last_summary: Option<PassSummary>,
    /// Error of the last pass, cleared by the next successful one.
    pub last_error: Option<String>,
}
