use std::sync::Arc;

use autodeliver_core::{CardInventory, Config, DeliveryOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    inventory: Arc<dyn CardInventory>,
    orchestrator: DeliveryOrchestrator,
}

impl AppState {
    pub fn new(
        config: Config,
        inventory: Arc<dyn CardInventory>,
        orchestrator: DeliveryOrchestrator,
    ) -> Self {
        Self {
            config,
            inventory,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn inventory(&self) -> &dyn CardInventory {
        self.inventory.as_ref()
    }

    pub fn orchestrator(&self) -> &DeliveryOrchestrator {
        &self.orchestrator
    }
}
