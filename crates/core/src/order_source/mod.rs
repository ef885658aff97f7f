//! Order acquisition.
//!
//! An [`OrderSource`] yields the orders that are paid and not yet delivered,
//! and optionally records a successful delivery in its own bookkeeping.

mod file;
mod remote;
mod types;

pub use file::FileOrderSource;
pub use remote::RemoteOrderSource;
pub use types::{select_eligible, Eligibility, Order, OrderSourceError, RawOrder, DEFAULT_BUYER_NICK};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{OrderSourceBackend, OrderSourceConfig};

/// Source of orders awaiting delivery.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Orders eligible for delivery right now, in feed order.
    async fn list_pending(&self) -> Result<Vec<Order>, OrderSourceError>;

    /// Mark an order delivered at the source. Sources without such a
    /// notion keep the default no-op.
    async fn acknowledge_delivered(&self, _order_id: &str) -> Result<(), OrderSourceError> {
        Ok(())
    }
}

/// Build the order source selected by configuration.
pub async fn create_order_source(
    config: &OrderSourceConfig,
) -> Result<Arc<dyn OrderSource>, OrderSourceError> {
    let missing = |section: &str| {
        OrderSourceError::Malformed(format!("missing [orders.{}] configuration", section))
    };

    match config.backend {
        OrderSourceBackend::File => {
            let file = config.file.as_ref().ok_or_else(|| missing("file"))?;
            Ok(Arc::new(FileOrderSource::open(file.path.clone()).await?))
        }
        OrderSourceBackend::Remote => {
            let remote = config.remote.as_ref().ok_or_else(|| missing("remote"))?;
            Ok(Arc::new(RemoteOrderSource::new(remote)?))
        }
    }
}
