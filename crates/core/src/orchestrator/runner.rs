//! Delivery orchestrator implementation.
//!
//! One pass fetches the pending orders and drives each of them through
//! ledger check, pool matching, allocation, delivery and commit or rollback.
//! The continuous loop runs a pass, sleeps for the poll interval and repeats;
//! a shutdown request is only honoured between passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::delivery::DeliveryChannel;
use crate::inventory::{Card, CardInventory, InventoryError};
use crate::matcher::ProductMatcher;
use crate::metrics;
use crate::order_source::{Order, OrderSource};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus, OrderOutcome, PassSummary};

/// Render the buyer-facing message for an order's codes.
pub fn render_delivery_message(order: &Order, cards: &[Card]) -> String {
    let mut lines = Vec::with_capacity(cards.len() + 2);
    lines.push(format!(
        "Hello {}, here are the codes for order {}:",
        order.buyer_nick, order.order_id
    ));
    lines.extend(
        cards
            .iter()
            .enumerate()
            .map(|(idx, card)| format!("{}. {}", idx + 1, card.code)),
    );
    lines.push("Please keep these codes safe and contact us if you have any problems.".to_string());
    lines.join("\n")
}

/// The delivery orchestrator - turns paid orders into delivered codes.
///
/// Cloning is cheap; clones share the same collaborators and runtime state.
#[derive(Clone)]
pub struct DeliveryOrchestrator {
    config: OrchestratorConfig,
    inventory: Arc<dyn CardInventory>,
    matcher: Arc<ProductMatcher>,
    order_source: Arc<dyn OrderSource>,
    channel: Arc<dyn DeliveryChannel>,

    // Runtime state
    running: Arc<AtomicBool>,
    status: Arc<RwLock<OrchestratorStatus>>,
    // Held for the duration of a pass so passes never overlap.
    pass_lock: Arc<Mutex<()>>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DeliveryOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        inventory: Arc<dyn CardInventory>,
        matcher: Arc<ProductMatcher>,
        order_source: Arc<dyn OrderSource>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            inventory,
            matcher,
            order_source,
            channel,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(RwLock::new(OrchestratorStatus::default())),
            pass_lock: Arc::new(Mutex::new(())),
            shutdown_tx,
            loop_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the continuous loop (spawns a background task).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            source = self.order_source.name(),
            channel = self.channel.name(),
            "Starting delivery orchestrator"
        );

        let handle = self.spawn_pass_loop();
        *self.loop_handle.lock().await = Some(handle);
    }

    /// Stop the loop, waiting for an in-flight pass to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping delivery orchestrator");

        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Pass loop terminated abnormally: {}", e);
            }
        }

        info!("Delivery orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_running();
        status
    }

    fn spawn_pass_loop(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(self.config.poll_interval_secs);

        tokio::spawn(async move {
            info!("Pass loop started");
            loop {
                if !this.running.load(Ordering::Relaxed) {
                    break;
                }

                // Errors are already recorded in status; keep polling.
                if let Err(e) = this.run_once().await {
                    error!("Delivery pass failed: {}", e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Pass loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Pass loop stopped");
        })
    }

    /// Run one pass over all pending orders.
    ///
    /// Per-order problems are counted in the summary. Storage and order
    /// source failures abort the pass and are returned.
    pub async fn run_once(&self) -> Result<PassSummary, OrchestratorError> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();

        let result = self.run_pass().await;

        metrics::PASS_DURATION.observe(started.elapsed().as_secs_f64());
        let mut status = self.status.write().await;
        status.passes_completed += 1;
        status.last_pass_at = Some(Utc::now());

        match &result {
            Ok(summary) => {
                metrics::PASSES_TOTAL.with_label_values(&["ok"]).inc();
                status.last_summary = Some(*summary);
                status.last_error = None;
                info!(
                    fetched = summary.fetched,
                    skipped = summary.skipped,
                    unmatched = summary.unmatched,
                    insufficient = summary.insufficient,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "Pass complete"
                );
            }
            Err(e) => {
                metrics::PASSES_TOTAL.with_label_values(&["error"]).inc();
                status.last_error = Some(e.to_string());
            }
        }

        result
    }

    async fn run_pass(&self) -> Result<PassSummary, OrchestratorError> {
        let orders = self.order_source.list_pending().await?;
        let mut summary = PassSummary {
            fetched: orders.len() as u64,
            ..Default::default()
        };

        for order in &orders {
            let outcome = self.process_order(order).await?;
            metrics::ORDERS_TOTAL
                .with_label_values(&[outcome.as_str()])
                .inc();
            summary.record(outcome);
        }

        Ok(summary)
    }

    /// Drive a single order to a terminal state.
    pub async fn process_order(&self, order: &Order) -> Result<OrderOutcome, OrchestratorError> {
        if self.inventory.is_delivered(&order.order_id)? {
            debug!(order_id = %order.order_id, "Order already delivered, skipping");
            return Ok(OrderOutcome::Skipped);
        }

        let Some(pool_key) = self.matcher.match_pool(&order.item_title) else {
            warn!(
                order_id = %order.order_id,
                title = %order.item_title,
                "No pool matches item title"
            );
            return Ok(OrderOutcome::Unmatched);
        };

        let cards = match self
            .inventory
            .allocate(pool_key, &order.order_id, order.quantity)
        {
            Ok(cards) => cards,
            Err(InventoryError::InsufficientInventory {
                requested,
                available,
                ..
            }) => {
                warn!(
                    order_id = %order.order_id,
                    pool = pool_key,
                    requested,
                    available,
                    "Not enough codes in pool"
                );
                return Ok(OrderOutcome::Insufficient);
            }
            Err(InventoryError::AlreadyCommitted(_)) => {
                debug!(order_id = %order.order_id, "Order delivered concurrently, skipping");
                return Ok(OrderOutcome::Skipped);
            }
            Err(InventoryError::ClaimInFlight(_)) => {
                warn!(
                    order_id = %order.order_id,
                    "Order already holds claimed codes, skipping until delivered or recovered"
                );
                return Ok(OrderOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        let message = render_delivery_message(order, &cards);
        let started = Instant::now();
        let delivery = self.channel.deliver(&order.order_id, &message).await;
        let elapsed = started.elapsed().as_secs_f64();

        match delivery {
            Ok(()) => {
                metrics::DELIVERY_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                // The buyer has the codes now; a failed commit must not release them.
                self.inventory
                    .commit_delivery(&order.order_id, cards.len() as u32, &message)?;
                info!(
                    order_id = %order.order_id,
                    pool = pool_key,
                    count = cards.len(),
                    "Order delivered"
                );

                if let Err(e) = self.order_source.acknowledge_delivered(&order.order_id).await {
                    warn!(
                        order_id = %order.order_id,
                        "Failed to acknowledge delivery at source: {}",
                        e
                    );
                }

                Ok(OrderOutcome::Delivered)
            }
            Err(e) => {
                metrics::DELIVERY_DURATION
                    .with_label_values(&["failure"])
                    .observe(elapsed);
                let released = self.inventory.rollback(&order.order_id)?;
                warn!(
                    order_id = %order.order_id,
                    released,
                    timeout = e.is_timeout(),
                    "Delivery failed, codes released: {}",
                    e
                );
                Ok(OrderOutcome::Failed)
            }
        }
    }
}
