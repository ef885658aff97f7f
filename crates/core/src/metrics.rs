//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (passes, per-order outcomes, delivery latency)
//! - Inventory (codes claimed and released)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Orders processed total by outcome.
pub static ORDERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autodeliver_orders_total", "Total orders processed"),
        &["outcome"], // "skipped", "unmatched", "insufficient", "delivered", "failed"
    )
    .unwrap()
});

/// Delivery channel call duration in seconds.
pub static DELIVERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autodeliver_delivery_duration_seconds",
            "Duration of delivery channel calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Pass duration in seconds.
pub static PASS_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "autodeliver_pass_duration_seconds",
            "Duration of a full pass over pending orders",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .unwrap()
});

/// Passes total by result.
pub static PASSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autodeliver_passes_total", "Total passes run"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Inventory Metrics
// =============================================================================

/// Codes claimed by allocations.
pub static CARDS_ALLOCATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "autodeliver_cards_allocated_total",
        "Total codes claimed for orders",
    )
    .unwrap()
});

/// Codes returned to their pool by rollback or recovery.
pub static CARDS_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "autodeliver_cards_released_total",
        "Total claimed codes returned to their pool",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(ORDERS_TOTAL.clone()),
        Box::new(DELIVERY_DURATION.clone()),
        Box::new(PASS_DURATION.clone()),
        Box::new(PASSES_TOTAL.clone()),
        // Inventory
        Box::new(CARDS_ALLOCATED.clone()),
        Box::new(CARDS_RELEASED.clone()),
    ]
}
