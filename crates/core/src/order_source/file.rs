//! JSON file order feed.
//!
//! The file holds a JSON array of order objects and is typically refreshed
//! by an external scraper. Acknowledging an order flips its `delivered` flag
//! and rewrites the whole file through a temporary sibling and a rename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{order_id_of, select_eligible, Eligibility, Order, OrderSourceError, RawOrder};
use super::OrderSource;

/// Order source backed by a local JSON file.
pub struct FileOrderSource {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileOrderSource {
    /// Open the feed, creating an empty `[]` file (and parent directories) if missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, OrderSourceError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, "[]").await?;
            debug!(path = %path.display(), "Created empty order file");
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(&self) -> Result<Vec<Value>, OrderSourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| OrderSourceError::Malformed(format!("{}: {}", self.path.display(), e)))?;
        match value {
            Value::Array(rows) => Ok(rows),
            _ => Err(OrderSourceError::Malformed(format!(
                "{}: expected a JSON array",
                self.path.display()
            ))),
        }
    }

    async fn write_rows(&self, rows: &[Value]) -> Result<(), OrderSourceError> {
        let content = serde_json::to_string_pretty(rows)
            .map_err(|e| OrderSourceError::Malformed(e.to_string()))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderSource for FileOrderSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn list_pending(&self) -> Result<Vec<Order>, OrderSourceError> {
        let rows = self
            .read_rows()
            .await?
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                serde_json::from_value::<RawOrder>(row).map_err(|e| {
                    OrderSourceError::Malformed(format!(
                        "{}: row {}: {}",
                        self.path.display(),
                        idx,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(select_eligible(rows, &Eligibility::PaidUndelivered))
    }

    async fn acknowledge_delivered(&self, order_id: &str) -> Result<(), OrderSourceError> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_rows().await?;

        let mut matched = 0;
        for row in rows.iter_mut() {
            let Some(object) = row.as_object_mut() else {
                continue;
            };
            let is_target = object
                .get("order_id")
                .and_then(order_id_of)
                .is_some_and(|id| id == order_id);
            if is_target {
                object.insert("delivered".to_string(), Value::Bool(true));
                matched += 1;
            }
        }

        self.write_rows(&rows).await?;
        debug!(order_id, matched, "Marked order delivered in file");
        Ok(())
    }
}
