//! Inventory data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One single-use code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Insertion-ordered identity; allocation consumes lowest ids first.
    pub id: i64,
    /// Pool the code belongs to.
    pub pool_key: String,
    /// The redeemable payload. Globally unique.
    pub code: String,
    pub is_used: bool,
    /// Order holding the claim. Set if and only if `is_used`.
    pub used_by_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Ledger entry written once an order's codes reached the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub order_id: String,
    pub delivered_at: DateTime<Utc>,
    pub card_count: u32,
    /// Rendered buyer message, only kept with [`LedgerDetail::Full`].
    pub message: Option<String>,
}

/// How much of each delivery the ledger keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDetail {
    /// Timestamp, card count and the delivered message.
    #[default]
    Full,
    /// Timestamp and card count only.
    Minimal,
}

/// Per-pool inventory counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub pool_key: String,
    pub total: u64,
    pub unused: u64,
    pub used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_detail_serde() {
        assert_eq!(
            serde_json::to_string(&LedgerDetail::Minimal).unwrap(),
            "\"minimal\""
        );
        let parsed: LedgerDetail = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(parsed, LedgerDetail::Full);
        assert_eq!(LedgerDetail::default(), LedgerDetail::Full);
    }

    #[test]
    fn test_delivery_record_without_message_serializes_null() {
        let record = DeliveryRecord {
            order_id: "A1".to_string(),
            delivered_at: Utc::now(),
            card_count: 2,
            message: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["order_id"], "A1");
        assert_eq!(json["card_count"], 2);
        assert!(json["message"].is_null());
    }
}
