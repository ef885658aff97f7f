pub mod config;
pub mod delivery;
pub mod inventory;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod order_source;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use delivery::{create_delivery_channel, DeliveryChannel, DeliveryError};
pub use inventory::{
    Card, CardInventory, DeliveryRecord, InventoryError, LedgerDetail, PoolStats, SqliteCardStore,
};
pub use matcher::{KeywordRule, MatcherError, ProductMatcher};
pub use orchestrator::{
    DeliveryOrchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus, OrderOutcome,
    PassSummary,
};
pub use order_source::{create_order_source, Order, OrderSource, OrderSourceError};
