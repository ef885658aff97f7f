//! Mock delivery channel for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryChannel, DeliveryError};

/// A recorded delivery attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub order_id: String,
    pub message: String,
    /// Whether the attempt was reported as successful.
    pub success: bool,
}

/// Mock implementation of the DeliveryChannel trait.
///
/// Provides controllable behavior for testing:
/// - Track every attempt with its message
/// - Fail specific orders until healed
/// - Fail the next attempt once
#[derive(Debug)]
pub struct MockDeliveryChannel {
    deliveries: Arc<RwLock<Vec<RecordedDelivery>>>,
    failing_orders: Arc<RwLock<HashSet<String>>>,
    /// If set, the next delivery fails with this error.
    next_error: Arc<RwLock<Option<DeliveryError>>>,
}

impl Default for MockDeliveryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeliveryChannel {
    /// Create a channel where every delivery succeeds.
    pub fn new() -> Self {
        Self {
            deliveries: Arc::new(RwLock::new(Vec::new())),
            failing_orders: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded delivery attempts.
    pub async fn recorded_deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.read().await.clone()
    }

    /// Number of attempts, successful or not.
    pub async fn delivery_count(&self) -> usize {
        self.deliveries.read().await.len()
    }

    /// Fail every delivery for this order until [`heal_order`](Self::heal_order).
    pub async fn fail_order(&self, order_id: &str) {
        self.failing_orders.write().await.insert(order_id.to_string());
    }

    pub async fn heal_order(&self, order_id: &str) {
        self.failing_orders.write().await.remove(order_id);
    }

    /// Configure the next delivery to fail with the given error.
    pub async fn set_next_error(&self, error: DeliveryError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl DeliveryChannel for MockDeliveryChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, order_id: &str, message: &str) -> Result<(), DeliveryError> {
        let error = match self.next_error.write().await.take() {
            Some(err) => Some(err),
            None if self.failing_orders.read().await.contains(order_id) => {
                Some(DeliveryError::Status {
                    status: 503,
                    body: "simulated delivery failure".to_string(),
                })
            }
            None => None,
        };

        self.deliveries.write().await.push(RecordedDelivery {
            order_id: order_id.to_string(),
            message: message.to_string(),
            success: error.is_none(),
        });

        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_and_heal() {
        let channel = MockDeliveryChannel::new();
        channel.fail_order("A1").await;

        assert!(channel.deliver("A1", "m").await.is_err());
        assert!(channel.deliver("A2", "m").await.is_ok());

        channel.heal_order("A1").await;
        assert!(channel.deliver("A1", "m").await.is_ok());

        let recorded = channel.recorded_deliveries().await;
        assert_eq!(recorded.len(), 3);
        assert!(!recorded[0].success);
        assert!(recorded[2].success);
    }

    #[tokio::test]
    async fn test_next_error_is_one_shot() {
        let channel = MockDeliveryChannel::new();
        channel
            .set_next_error(DeliveryError::Timeout { timeout_secs: 1 })
            .await;

        assert!(channel.deliver("A1", "m").await.unwrap_err().is_timeout());
        assert!(channel.deliver("A1", "m").await.is_ok());
    }
}
