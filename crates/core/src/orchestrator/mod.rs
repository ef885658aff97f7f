//! Delivery orchestrator.
//!
//! Coordinates the card inventory, the product matcher, the order source and
//! the delivery channel:
//! - **Pass**: sequential, one order at a time, returns a [`PassSummary`]
//! - **Loop**: one pass, then the poll interval, until stopped

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{render_delivery_message, DeliveryOrchestrator};
pub use types::{OrchestratorError, OrchestratorStatus, OrderOutcome, PassSummary};
