//! Configuration management for Strata
//!
//! Every numeric retrieval policy (RRF constant, anchor weights, eviction
//! limits) is a named default living here or in its owning module - they are
//! policy choices, not derived constants, and stay tunable through
//! configuration rather than being hardcoded at use sites.

use crate::anchor::AnchorConfig;
use crate::error::{Result, StrataError};
use crate::fusion::FusionConfig;
use crate::quality::QualityGateOptions;
use crate::session::SessionLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod validator;

pub use validator::ConfigValidator;

/// Default maximum results returned per search call
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
/// Default similarity threshold for similarity-scale re-scoring
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.3;
/// Candidate over-fetch multiplier: each backend is asked for
/// `limit * multiplier` candidates so fusion has enough overlap to work with
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;
/// Default timeout for embedding and backend queries, in milliseconds
pub const DEFAULT_DEPENDENCY_TIMEOUT_MS: u64 = 5_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub anchors: AnchorConfig,
    #[serde(default)]
    pub quality: QualityGateOptions,
    #[serde(default)]
    pub search: SearchDefaults,
    #[serde(default)]
    pub sessions: SessionLimits,
}

/// Search-call defaults, overridable per call through `SearchOptions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    pub limit: usize,
    pub relevance_threshold: f32,
    pub candidate_multiplier: usize,
    pub timeout_ms: u64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            timeout_ms: DEFAULT_DEPENDENCY_TIMEOUT_MS,
        }
    }
}

impl StrataConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StrataError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: StrataConfig = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| StrataError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: STRATA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("STRATA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
            value.parse().map_err(|_| StrataError::InvalidConfigValue {
                path: path.to_string(),
                message: format!("Cannot parse '{}'", value),
            })
        }

        match path {
            "FUSION__RRF_K" => {
                self.fusion.rrf_k = parse(path, value)?;
            }
            "FUSION__DENSE_WEIGHT" => {
                self.fusion.dense_weight = parse(path, value)?;
            }
            "FUSION__SPARSE_WEIGHT" => {
                self.fusion.sparse_weight = parse(path, value)?;
            }
            "ANCHORS__NEGATIVE_FILTER_THRESHOLD" => {
                self.anchors.negative_filter_threshold = parse(path, value)?;
            }
            "SEARCH__LIMIT" => {
                self.search.limit = parse(path, value)?;
            }
            "SEARCH__TIMEOUT_MS" => {
                self.search.timeout_ms = parse(path, value)?;
            }
            "SESSIONS__MAX_SESSIONS" => {
                self.sessions.max_sessions = parse(path, value)?;
            }
            "SESSIONS__TTL_SECS" => {
                self.sessions.ttl_secs = parse(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_documented_policy_values() {
        let config = StrataConfig::default();
        assert_eq!(config.fusion.rrf_k, 60.0);
        assert_eq!(config.fusion.dense_weight, 0.6);
        assert_eq!(config.fusion.sparse_weight, 0.4);
        assert_eq!(config.anchors.positive_weight, 0.3);
        assert_eq!(config.anchors.negative_weight, 0.2);
        assert_eq!(config.anchors.negative_filter_threshold, 0.85);
        assert_eq!(config.search.limit, 20);
        assert_eq!(config.search.relevance_threshold, 0.3);
    }

    #[test]
    fn test_toml_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("strata.toml");

        let mut config = StrataConfig::default();
        config.search.limit = 50;
        config.save(&path).unwrap();

        let loaded = StrataConfig::load(&path).unwrap();
        assert_eq!(loaded.search.limit, 50);
        assert_eq!(loaded.fusion.rrf_k, 60.0);
    }

    #[test]
    fn test_missing_file_is_config_not_found() {
        let result = StrataConfig::load(Path::new("/nonexistent/strata.toml"));
        assert!(matches!(result, Err(StrataError::ConfigNotFound { .. })));
    }
}
