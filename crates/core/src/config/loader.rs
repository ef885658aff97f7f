use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Variable naming the config file itself; never a config key.
const CONFIG_PATH_VAR: &str = "config";

/// `AUTODELIVER_`-prefixed overrides, nested with `__`
/// (`AUTODELIVER_DELIVERY__HTTP__TOKEN` sets `delivery.http.token`).
fn env_overrides() -> Env {
    Env::prefixed("AUTODELIVER_")
        .split("__")
        .ignore(&[CONFIG_PATH_VAR])
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load the config file at `path`, with environment overrides on top.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::from(Toml::file(path)).merge(env_overrides()))
}

/// Parse TOML text without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::from(Toml::string(toml_str)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const FILE_FEED: &str = r#"
[orders]
backend = "file"
[orders.file]
path = "data/orders.json"

[delivery]
backend = "http"
[delivery.http]
url = "https://helper.example/orders/{order_id}/deliver"
token = "from-file"
"#;

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", FILE_FEED)?;
            jail.set_env("AUTODELIVER_DELIVERY__HTTP__TOKEN", "from-env");
            jail.set_env("AUTODELIVER_ORCHESTRATOR__POLL_INTERVAL_SECS", "45");
            jail.set_env("AUTODELIVER_CONFIG", "config.toml");

            let config = load_config(Path::new("config.toml")).unwrap();
            assert_eq!(config.delivery.http.unwrap().token, "from-env");
            assert_eq!(config.orchestrator.poll_interval_secs, 45);
            Ok(())
        });
    }

    #[test]
    fn test_from_str_ignores_env() {
        Jail::expect_with(|jail| {
            jail.set_env("AUTODELIVER_DELIVERY__HTTP__TOKEN", "from-env");
            let config = load_config_from_str(FILE_FEED).unwrap();
            assert_eq!(config.delivery.http.unwrap().token, "from-file");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_and_directory() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/config.toml")),
            Err(ConfigError::FileNotFound(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_orders_section_is_parse_error() {
        let result = load_config_from_str("[delivery]\nbackend = \"command\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
