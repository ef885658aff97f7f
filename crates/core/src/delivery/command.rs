//! Delivery through an external shell command.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{truncate_body, DeliveryChannel, DeliveryError};
use crate::config::CommandDeliveryConfig;

/// Runs a command template through `sh -c`.
///
/// `{order_id}` and `{message}` are substituted with values escaped for use
/// inside a double-quoted argument, e.g. `--message "{message}"`.
pub struct CommandDelivery {
    template: String,
    timeout_secs: Option<u64>,
}

impl CommandDelivery {
    pub fn new(config: &CommandDeliveryConfig) -> Self {
        Self {
            template: config.template.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    /// The shell command line for one delivery.
    pub fn render(&self, order_id: &str, message: &str) -> String {
        self.template
            .replace("{order_id}", &escape_shell_value(order_id))
            .replace("{message}", &escape_shell_value(message))
    }
}

/// Backslash-escape the characters that stay special inside double quotes.
pub fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl DeliveryChannel for CommandDelivery {
    fn name(&self) -> &str {
        "command"
    }

    async fn deliver(&self, order_id: &str, message: &str) -> Result<(), DeliveryError> {
        let command_line = self.render(order_id, message);
        debug!(order_id, "Running delivery command");

        let run = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), run)
                .await
                .map_err(|_| DeliveryError::Timeout { timeout_secs: secs })?,
            None => run.await,
        }
        .map_err(DeliveryError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(DeliveryError::CommandFailed {
            exit_code: output.status.code(),
            output: truncate_body(&combined),
        })
    }
}
