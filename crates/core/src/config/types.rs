use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::inventory::LedgerDetail;
use crate::matcher::KeywordRule;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub orders: OrderSourceConfig,
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Status API, only served in continuous mode.
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How much of each delivery is kept in the ledger.
    #[serde(default)]
    pub ledger_detail: LedgerDetail,
    /// How long a writer waits on another process holding the database lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            ledger_detail: LedgerDetail::default(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("autodeliver.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Where pending orders come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderSourceConfig {
    pub backend: OrderSourceBackend,
    /// Required when backend = "file"
    #[serde(default)]
    pub file: Option<FileOrderSourceConfig>,
    /// Required when backend = "remote"
    #[serde(default)]
    pub remote: Option<RemoteOrderSourceConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderSourceBackend {
    File,
    Remote,
}

/// JSON order feed on local disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileOrderSourceConfig {
    pub path: PathBuf,
}

/// Authenticated HTTP order feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteOrderSourceConfig {
    /// Full URL of the pending-orders endpoint
    pub url: String,
    /// Bearer token
    pub token: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Status string that marks an order as ready for delivery
    #[serde(default = "default_pending_status")]
    pub pending_status: String,
}

fn default_timeout() -> u32 {
    15
}

fn default_pending_status() -> String {
    "pending".to_string()
}

/// How codes reach the buyer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    pub backend: DeliveryBackend,
    /// Required when backend = "command"
    #[serde(default)]
    pub command: Option<CommandDeliveryConfig>,
    /// Required when backend = "http"
    #[serde(default)]
    pub http: Option<HttpDeliveryConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryBackend {
    Command,
    Http,
}

/// External command delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDeliveryConfig {
    /// Shell command with `{order_id}` and `{message}` placeholders
    pub template: String,
    /// Kill the command after this many seconds (no limit when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// HTTP delivery endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpDeliveryConfig {
    /// URL template; `{order_id}` is substituted URL-encoded
    pub url: String,
    /// Bearer token
    pub token: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Product title to pool mapping.
///
/// Inline rules are tried first in file order, then the entries of the
/// mapping file in document order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatcherConfig {
    /// Optional JSON object `{ "keyword": "pool" }`
    #[serde(default)]
    pub mapping_path: Option<PathBuf>,
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub database: DatabaseConfig,
    pub orders: SanitizedOrderSourceConfig,
    pub delivery: SanitizedDeliveryConfig,
    pub matcher: MatcherConfig,
    pub orchestrator: OrchestratorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOrderSourceConfig {
    pub backend: OrderSourceBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileOrderSourceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<SanitizedRemoteConfig>,
}

/// Remote endpoint with the token hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteConfig {
    pub url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDeliveryConfig {
    pub backend: DeliveryBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandDeliveryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<SanitizedRemoteConfig>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
            orders: SanitizedOrderSourceConfig {
                backend: config.orders.backend,
                file: config.orders.file.clone(),
                remote: config.orders.remote.as_ref().map(|r| SanitizedRemoteConfig {
                    url: r.url.clone(),
                    token_configured: !r.token.is_empty(),
                    timeout_secs: r.timeout_secs,
                }),
            },
            delivery: SanitizedDeliveryConfig {
                backend: config.delivery.backend,
                command: config.delivery.command.clone(),
                http: config.delivery.http.as_ref().map(|h| SanitizedRemoteConfig {
                    url: h.url.clone(),
                    token_configured: !h.token.is_empty(),
                    timeout_secs: h.timeout_secs,
                }),
            },
            matcher: config.matcher.clone(),
            orchestrator: config.orchestrator.clone(),
            server: config.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[orders]
backend = "file"

[orders.file]
path = "orders.json"

[delivery]
backend = "command"

[delivery.command]
template = "echo {order_id}"

[[matcher.rules]]
keyword = "gpt"
pool = "GPT"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.orders.backend, OrderSourceBackend::File);
        assert_eq!(config.delivery.backend, DeliveryBackend::Command);
        assert_eq!(config.matcher.rules.len(), 1);
        assert!(config.server.is_none());
    }

    #[test]
    fn test_deserialize_with_default_database() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "autodeliver.db");
        assert_eq!(config.database.ledger_detail, LedgerDetail::Full);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.orchestrator.poll_interval_secs, 15);
    }

    #[test]
    fn test_deserialize_missing_delivery_fails() {
        let toml = r#"
[orders]
backend = "file"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_remote_defaults() {
        let toml = r#"
[orders]
backend = "remote"

[orders.remote]
url = "https://helper.example/api/orders"
token = "t0ken"

[delivery]
backend = "http"

[delivery.http]
url = "https://helper.example/api/orders/{order_id}/deliver"
token = "t0ken"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let remote = config.orders.remote.as_ref().unwrap();
        assert_eq!(remote.timeout_secs, 15);
        assert_eq!(remote.pending_status, "pending");
        assert_eq!(config.delivery.http.as_ref().unwrap().timeout_secs, 15);
    }

    #[test]
    fn test_deserialize_server_section() {
        let toml = format!("{}\n[server]\nport = 9000\n", MINIMAL);
        let config: Config = toml::from_str(&toml).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.port, 9000);
        assert_eq!(server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_sanitized_config_hides_tokens() {
        let toml = r#"
[orders]
backend = "remote"

[orders.remote]
url = "https://helper.example/api/orders"
token = "secret-token"

[delivery]
backend = "http"

[delivery.http]
url = "https://helper.example/deliver/{order_id}"
token = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        let remote = sanitized.orders.remote.as_ref().unwrap();
        assert!(remote.token_configured);
        let http = sanitized.delivery.http.as_ref().unwrap();
        assert!(!http.token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-token"));
    }
}
