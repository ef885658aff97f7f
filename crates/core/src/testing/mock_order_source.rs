//! Mock order source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::order_source::{Order, OrderSource, OrderSourceError};

/// Mock implementation of the OrderSource trait.
///
/// Orders stay listed until removed, like a feed without acknowledgement
/// support, so repeated passes see them again. Acknowledgements are
/// recorded for assertions.
#[derive(Debug)]
pub struct MockOrderSource {
    /// Orders returned by `list_pending`.
    orders: Arc<RwLock<Vec<Order>>>,
    /// Order ids passed to `acknowledge_delivered`.
    acknowledged: Arc<RwLock<Vec<String>>>,
    /// If set, the next `list_pending` call fails with this error.
    next_list_error: Arc<RwLock<Option<OrderSourceError>>>,
    /// If set, the next `acknowledge_delivered` call fails with this error.
    acknowledge_error: Arc<RwLock<Option<OrderSourceError>>>,
    /// Whether acknowledged orders drop out of the pending list.
    remove_on_acknowledge: Arc<RwLock<bool>>,
}

impl Default for MockOrderSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOrderSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(Vec::new())),
            acknowledged: Arc::new(RwLock::new(Vec::new())),
            next_list_error: Arc::new(RwLock::new(None)),
            acknowledge_error: Arc::new(RwLock::new(None)),
            remove_on_acknowledge: Arc::new(RwLock::new(false)),
        }
    }

    /// Create a mock source listing the given orders.
    pub fn with_orders(orders: Vec<Order>) -> Self {
        let mut source = Self::new();
        source.orders = Arc::new(RwLock::new(orders));
        source
    }

    pub async fn add_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }

    pub async fn remove_order(&self, order_id: &str) {
        self.orders.write().await.retain(|o| o.order_id != order_id);
    }

    /// Order ids acknowledged so far, in call order.
    pub async fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.read().await.clone()
    }

    /// Configure the next listing to fail.
    pub async fn set_next_list_error(&self, error: OrderSourceError) {
        *self.next_list_error.write().await = Some(error);
    }

    /// Configure the next acknowledgement to fail.
    pub async fn set_acknowledge_error(&self, error: OrderSourceError) {
        *self.acknowledge_error.write().await = Some(error);
    }

    pub async fn set_remove_on_acknowledge(&self, remove: bool) {
        *self.remove_on_acknowledge.write().await = remove;
    }
}

#[async_trait]
impl OrderSource for MockOrderSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_pending(&self) -> Result<Vec<Order>, OrderSourceError> {
        if let Some(err) = self.next_list_error.write().await.take() {
            return Err(err);
        }
        Ok(self.orders.read().await.clone())
    }

    async fn acknowledge_delivered(&self, order_id: &str) -> Result<(), OrderSourceError> {
        self.acknowledged.write().await.push(order_id.to_string());
        if let Some(err) = self.acknowledge_error.write().await.take() {
            return Err(err);
        }
        if *self.remove_on_acknowledge.read().await {
            self.remove_order(order_id).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_and_acknowledge() {
        let source = MockOrderSource::new();
        source.add_order(fixtures::order("A1", "gpt", 1)).await;

        assert_eq!(source.list_pending().await.unwrap().len(), 1);
        source.acknowledge_delivered("A1").await.unwrap();
        assert_eq!(source.acknowledged().await, vec!["A1"]);
        assert_eq!(source.list_pending().await.unwrap().len(), 1);

        source.set_remove_on_acknowledge(true).await;
        source.acknowledge_delivered("A1").await.unwrap();
        assert!(source.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_next_list_error_is_one_shot() {
        let source = MockOrderSource::with_orders(vec![fixtures::order("A1", "gpt", 1)]);
        source
            .set_next_list_error(OrderSourceError::Malformed("boom".to_string()))
            .await;

        assert!(source.list_pending().await.is_err());
        assert!(source.list_pending().await.is_ok());
    }
}
