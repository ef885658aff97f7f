//! Delivery channels.
//!
//! A channel transmits the rendered message for an order to the buyer. The
//! outcome is binary: `Ok(())` means the buyer has the codes, any error
//! means they do not and the claimed codes must be released.

mod command;
mod http;

pub use command::{escape_shell_value, CommandDelivery};
pub use http::HttpDelivery;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DeliveryBackend, DeliveryConfig};

const MAX_BODY_CHARS: usize = 512;

/// Errors raised by delivery channels.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The delivery command exited unsuccessfully.
    #[error("delivery command failed (exit code {exit_code:?}): {output}")]
    CommandFailed {
        exit_code: Option<i32>,
        output: String,
    },

    /// The delivery command could not be started.
    #[error("failed to spawn delivery command: {0}")]
    Spawn(#[source] std::io::Error),

    /// The delivery command ran past its time limit and was killed.
    #[error("delivery command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The HTTP request could not be completed.
    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The delivery endpoint answered with a non-success status.
    #[error("delivery endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The selected backend has no configuration section.
    #[error("delivery channel not configured: {0}")]
    NotConfigured(String),
}

impl DeliveryError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Request(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Sends a delivery message for an order.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Backend name, for logs and metrics.
    fn name(&self) -> &str;

    /// Deliver `message` to the buyer of `order_id`. No retries.
    async fn deliver(&self, order_id: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Build the delivery channel selected by configuration.
pub fn create_delivery_channel(
    config: &DeliveryConfig,
) -> Result<Arc<dyn DeliveryChannel>, DeliveryError> {
    match config.backend {
        DeliveryBackend::Command => {
            let command = config
                .command
                .as_ref()
                .ok_or_else(|| DeliveryError::NotConfigured("[delivery.command]".to_string()))?;
            Ok(Arc::new(CommandDelivery::new(command)))
        }
        DeliveryBackend::Http => {
            let http = config
                .http
                .as_ref()
                .ok_or_else(|| DeliveryError::NotConfigured("[delivery.http]".to_string()))?;
            Ok(Arc::new(HttpDelivery::new(http)?))
        }
    }
}

/// Cap remote or process output kept in error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
