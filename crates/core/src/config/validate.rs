use super::types::{Config, DeliveryBackend, OrderSourceBackend};
use super::ConfigError;

/// Validate configuration once at startup.
///
/// Checks:
/// - The section for the selected order and delivery backends exists
/// - Templates, URLs and tokens are non-empty
/// - Poll interval and server port are non-zero
/// - The matcher has at least one rule or a mapping file, with no empty fields
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match config.orders.backend {
        OrderSourceBackend::File => {
            let file = config
                .orders
                .file
                .as_ref()
                .ok_or_else(|| missing("orders.file"))?;
            if file.path.as_os_str().is_empty() {
                return Err(invalid("orders.file.path cannot be empty"));
            }
        }
        OrderSourceBackend::Remote => {
            let remote = config
                .orders
                .remote
                .as_ref()
                .ok_or_else(|| missing("orders.remote"))?;
            check_url("orders.remote.url", &remote.url)?;
            check_token("orders.remote.token", &remote.token)?;
            if remote.pending_status.trim().is_empty() {
                return Err(invalid("orders.remote.pending_status cannot be empty"));
            }
        }
    }

    match config.delivery.backend {
        DeliveryBackend::Command => {
            let command = config
                .delivery
                .command
                .as_ref()
                .ok_or_else(|| missing("delivery.command"))?;
            if command.template.trim().is_empty() {
                return Err(invalid("delivery.command.template cannot be empty"));
            }
            if command.timeout_secs == Some(0) {
                return Err(invalid("delivery.command.timeout_secs cannot be 0"));
            }
        }
        DeliveryBackend::Http => {
            let http = config
                .delivery
                .http
                .as_ref()
                .ok_or_else(|| missing("delivery.http"))?;
            check_url("delivery.http.url", &http.url)?;
            check_token("delivery.http.token", &http.token)?;
        }
    }

    if config.matcher.rules.is_empty() && config.matcher.mapping_path.is_none() {
        return Err(invalid(
            "matcher needs at least one rule or a mapping_path",
        ));
    }
    for (idx, rule) in config.matcher.rules.iter().enumerate() {
        if rule.keyword.trim().is_empty() {
            return Err(invalid(&format!("matcher.rules[{}].keyword cannot be empty", idx)));
        }
        if rule.pool.trim().is_empty() {
            return Err(invalid(&format!("matcher.rules[{}].pool cannot be empty", idx)));
        }
    }

    if config.orchestrator.poll_interval_secs == 0 {
        return Err(invalid("orchestrator.poll_interval_secs cannot be 0"));
    }

    if let Some(server) = &config.server {
        if server.port == 0 {
            return Err(invalid("server.port cannot be 0"));
        }
    }

    Ok(())
}

fn missing(section: &str) -> ConfigError {
    ConfigError::ValidationError(format!("missing required section [{}]", section))
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be an http(s) URL", field)))
    }
}

fn check_token(field: &str, token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        Err(invalid(&format!("{} cannot be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base() -> Config {
        load_config_from_str(
            r#"
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
"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config) {
        let result = validate_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base()).is_ok());
    }

    #[test]
    fn test_validate_missing_backend_section() {
        let mut config = base();
        config.orders.file = None;
        assert_invalid(&config);

        let mut config = base();
        config.delivery.backend = DeliveryBackend::Http;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_empty_template() {
        let mut config = base();
        config.delivery.command.as_mut().unwrap().template = "  ".to_string();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_no_matcher_rules() {
        let mut config = base();
        config.matcher.rules.clear();
        assert_invalid(&config);

        config.matcher.mapping_path = Some("mapping.json".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_rule_keyword() {
        let mut config = base();
        config.matcher.rules[0].keyword = String::new();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_poll_interval_zero_fails() {
        let mut config = base();
        config.orchestrator.poll_interval_secs = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_remote_requires_http_url_and_token() {
        let toml = r#"
[orders]
backend = "remote"

[orders.remote]
url = "ftp://helper.example"
token = "abc"

[delivery]
backend = "http"

[delivery.http]
url = "https://helper.example/deliver/{order_id}"
token = "abc"

[[matcher.rules]]
keyword = "gpt"
pool = "GPT"
"#;
        let mut config = load_config_from_str(toml).unwrap();
        assert_invalid(&config);

        config.orders.remote.as_mut().unwrap().url = "https://helper.example".to_string();
        assert!(validate_config(&config).is_ok());

        config.delivery.http.as_mut().unwrap().token = String::new();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_server_port_zero_fails() {
        let mut config = base();
        config.server = Some(crate::config::ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
        });
        assert_invalid(&config);
    }
}
