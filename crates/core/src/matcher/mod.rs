//! Product title to card pool matching.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::MatcherConfig;

/// Errors raised while building a matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mapping file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("rule {index} has an empty keyword")]
    EmptyKeyword { index: usize },
}

/// One keyword-to-pool rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub pool: String,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, pool: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            pool: pool.into(),
        }
    }
}

/// Maps free-text product titles to pool keys.
///
/// Each keyword is matched as a case-insensitive substring of the title.
/// Rules are tried in order and the first hit wins.
#[derive(Debug, Clone, Default)]
pub struct ProductMatcher {
    // (lowercased keyword, pool key)
    rules: Vec<(String, String)>,
}

impl ProductMatcher {
    /// Build a matcher from ordered rules.
    pub fn new(rules: Vec<KeywordRule>) -> Result<Self, MatcherError> {
        let mut matcher = Self::default();
        matcher.extend(rules)?;
        Ok(matcher)
    }

    /// Load a JSON object `{ "keyword": "pool" }`, keeping document order.
    pub fn from_json_file(path: &Path) -> Result<Self, MatcherError> {
        Self::new(read_mapping_file(path)?)
    }

    /// Inline rules first, then the mapping file entries when configured.
    pub fn from_config(config: &MatcherConfig) -> Result<Self, MatcherError> {
        let mut matcher = Self::new(config.rules.clone())?;
        if let Some(path) = &config.mapping_path {
            matcher.extend(read_mapping_file(path)?)?;
        }
        debug!(rules = matcher.len(), "Built product matcher");
        Ok(matcher)
    }

    fn extend(&mut self, rules: Vec<KeywordRule>) -> Result<(), MatcherError> {
        for rule in rules {
            let keyword = rule.keyword.trim().to_lowercase();
            if keyword.is_empty() {
                return Err(MatcherError::EmptyKeyword {
                    index: self.rules.len(),
                });
            }
            self.rules.push((keyword, rule.pool));
        }
        Ok(())
    }

    /// Pool key of the first rule whose keyword appears in `title`.
    pub fn match_pool(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| title.contains(keyword.as_str()))
            .map(|(_, pool)| pool.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn read_mapping_file(path: &Path) -> Result<Vec<KeywordRule>, MatcherError> {
    let content = std::fs::read_to_string(path).map_err(|source| MatcherError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let malformed = |reason: String| MatcherError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    object
        .iter()
        .map(|(keyword, pool)| match pool {
            serde_json::Value::String(pool) => Ok(KeywordRule::new(keyword.clone(), pool.clone())),
            other => Err(malformed(format!(
                "pool for keyword {:?} must be a string, got {}",
                keyword, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(rules: &[(&str, &str)]) -> ProductMatcher {
        ProductMatcher::new(rules.iter().map(|(k, p)| KeywordRule::new(*k, *p)).collect()).unwrap()
    }

    #[test]
    fn test_case_insensitive_substring() {
        let m = matcher(&[("gpt", "GPT")]);
        assert_eq!(m.match_pool("ChatGPT Plus 1 month"), Some("GPT"));
        assert_eq!(m.match_pool("CHATgpt"), Some("GPT"));
    }

    #[test]
    fn test_no_match() {
        let m = matcher(&[("gpt", "GPT")]);
        assert_eq!(m.match_pool("Netflix"), None);
        assert_eq!(m.match_pool(""), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let m = matcher(&[("gpt plus", "GPT_PLUS"), ("gpt", "GPT")]);
        assert_eq!(m.match_pool("GPT Plus annual"), Some("GPT_PLUS"));
        assert_eq!(m.match_pool("GPT team"), Some("GPT"));

        let reversed = matcher(&[("gpt", "GPT"), ("gpt plus", "GPT_PLUS")]);
        assert_eq!(reversed.match_pool("GPT Plus annual"), Some("GPT"));
    }

    #[test]
    fn test_non_ascii_keywords() {
        let m = matcher(&[("会员", "VIP")]);
        assert_eq!(m.match_pool("年度会员卡"), Some("VIP"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let result = ProductMatcher::new(vec![KeywordRule::new("gpt", "GPT"), KeywordRule::new("  ", "X")]);
        assert!(matches!(result, Err(MatcherError::EmptyKeyword { index: 1 })));
    }

    #[test]
    fn test_json_file_keeps_document_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"zeta": "Z", "netflix premium": "NF_PREMIUM", "netflix": "NF"}"#)
            .unwrap();

        let m = ProductMatcher::from_json_file(&path).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.match_pool("Netflix Premium 4K"), Some("NF_PREMIUM"));
        assert_eq!(m.match_pool("Netflix basic"), Some("NF"));
    }

    #[test]
    fn test_json_file_must_be_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("mapping.json");
        std::fs::write(&path, r#"[["gpt", "GPT"]]"#).unwrap();
        assert!(matches!(
            ProductMatcher::from_json_file(&path),
            Err(MatcherError::Malformed { .. })
        ));

        std::fs::write(&path, r#"{"gpt": 3}"#).unwrap();
        assert!(matches!(
            ProductMatcher::from_json_file(&path),
            Err(MatcherError::Malformed { .. })
        ));
    }

    #[test]
    fn test_json_file_missing() {
        let result = ProductMatcher::from_json_file(Path::new("/nonexistent/mapping.json"));
        assert!(matches!(result, Err(MatcherError::Io { .. })));
    }

    #[test]
    fn test_from_config_rules_before_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"gpt": "FROM_FILE", "netflix": "NF"}"#).unwrap();

        let config = MatcherConfig {
            mapping_path: Some(path),
            rules: vec![KeywordRule::new("gpt", "INLINE")],
        };
        let m = ProductMatcher::from_config(&config).unwrap();
        assert_eq!(m.match_pool("gpt plus"), Some("INLINE"));
        assert_eq!(m.match_pool("netflix"), Some("NF"));
    }
}
