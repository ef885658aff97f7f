//! Order source types.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Default display name when a record carries no buyer nick.
pub const DEFAULT_BUYER_NICK: &str = "buyer";

/// A paid order awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    /// Free-text product title, only used for pool matching.
    pub item_title: String,
    pub buyer_nick: String,
    /// Number of codes to deliver. Always at least 1.
    pub quantity: u32,
}

/// Errors raised by order sources.
#[derive(Debug, Error)]
pub enum OrderSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed order data: {0}")]
    Malformed(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("order feed returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Rule deciding which raw records are ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// `paid && !delivered`, used by file feeds.
    PaidUndelivered,
    /// The record's status equals this value, used by remote feeds.
    Status(String),
}

/// One order row as it appears in a feed, before eligibility filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub item_title: String,
    #[serde(default)]
    pub buyer_nick: Option<String>,
    /// Integer or numeric string.
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: Option<i64>,
    /// Booleans, 0/1 and "true"/"false" are accepted for both flags.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub paid: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub delivered: bool,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawOrder {
    /// Whether this record should be delivered now.
    pub fn is_eligible(&self, rule: &Eligibility) -> bool {
        match rule {
            Eligibility::PaidUndelivered => self.paid && !self.delivered,
            Eligibility::Status(pending) => self.status.as_deref() == Some(pending.as_str()),
        }
    }

    pub fn into_order(self) -> Order {
        let quantity = self.quantity.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        Order {
            order_id: self.order_id,
            item_title: self.item_title,
            buyer_nick: self
                .buyer_nick
                .unwrap_or_else(|| DEFAULT_BUYER_NICK.to_string()),
            quantity,
        }
    }
}

/// Keep eligible rows and convert them into orders, preserving feed order.
pub fn select_eligible(rows: Vec<RawOrder>, rule: &Eligibility) -> Vec<Order> {
    rows.into_iter()
        .filter(|row| row.is_eligible(rule))
        .map(RawOrder::into_order)
        .collect()
}

/// Canonical string form of an `order_id` JSON value.
pub(crate) fn order_id_of(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    order_id_of(&value)
        .ok_or_else(|| serde::de::Error::custom("order_id must be a string or a number"))
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("quantity is out of range")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("quantity {:?} is not an integer", s))),
        other => Err(serde::de::Error::custom(format!(
            "quantity must be an integer, got {}",
            other
        ))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("{:?} is not a boolean", s))),
        },
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}
