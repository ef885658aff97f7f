//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the delivery orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay between the end of one pass and the start of the next (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    15
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_deserialize_full() {
        let config: OrchestratorConfig = toml::from_str("poll_interval_secs = 60").unwrap();
        assert_eq!(config.poll_interval_secs, 60);
    }
}
