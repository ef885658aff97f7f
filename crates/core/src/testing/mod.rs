//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the order source and
//! delivery channel traits, allowing orchestrator and API tests to run
//! without a real order feed or buyer-facing channel. `MockCardInventory`
//! injects storage failures into an in-memory card store.
//!
//! # Example
//!
//! ```rust,ignore
//! use autodeliver_core::testing::{fixtures, MockDeliveryChannel, MockOrderSource};
//!
//! let source = MockOrderSource::new();
//! let channel = MockDeliveryChannel::new();
//!
//! source.add_order(fixtures::order("A1", "ChatGPT Plus", 1)).await;
//! channel.fail_order("A1").await;
//!
//! // Hand both to a DeliveryOrchestrator...
//! ```

mod mock_card_inventory;
mod mock_delivery_channel;
mod mock_order_source;

pub use mock_card_inventory::MockCardInventory;
pub use mock_delivery_channel::{MockDeliveryChannel, RecordedDelivery};
pub use mock_order_source::MockOrderSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::inventory::Card;
    use crate::order_source::Order;

    /// Create a test order placed by "alice".
    pub fn order(order_id: &str, item_title: &str, quantity: u32) -> Order {
        Order {
            order_id: order_id.to_string(),
            item_title: item_title.to_string(),
            buyer_nick: "alice".to_string(),
            quantity,
        }
    }

    /// Create an unused card.
    pub fn card(id: i64, pool_key: &str, code: &str) -> Card {
        Card {
            id,
            pool_key: pool_key.to_string(),
            code: code.to_string(),
            is_used: false,
            used_by_order_id: None,
            created_at: Utc::now(),
            used_at: None,
        }
    }

    /// Newline-delimited codes `PREFIX-001`, `PREFIX-002`, ...
    pub fn code_lines(prefix: &str, count: usize) -> String {
        (1..=count).map(|i| format!("{}-{:03}\n", prefix, i)).collect()
    }
}
