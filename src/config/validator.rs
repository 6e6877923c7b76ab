use crate::config::StrataConfig;
use crate::error::{Result, StrataError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &StrataConfig) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_fusion(config, &mut errors);
        Self::validate_anchors(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_sessions(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StrataError::ConfigValidation { errors })
        }
    }

    fn validate_fusion(config: &StrataConfig, errors: &mut Vec<ValidationError>) {
        if config.fusion.dense_weight <= 0.0 {
            errors.push(ValidationError::new(
                "fusion.dense_weight",
                "Dense weight must be positive",
            ));
        }

        if config.fusion.sparse_weight <= 0.0 {
            errors.push(ValidationError::new(
                "fusion.sparse_weight",
                "Sparse weight must be positive",
            ));
        }

        if config.fusion.rrf_k < 0.0 {
            errors.push(ValidationError::new(
                "fusion.rrf_k",
                "RRF K must be non-negative",
            ));
        }
    }

    fn validate_anchors(config: &StrataConfig, errors: &mut Vec<ValidationError>) {
        let threshold = config.anchors.negative_filter_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                "anchors.negative_filter_threshold",
                format!("Threshold must be between 0.0 and 1.0, got {}", threshold),
            ));
        }

        if config.anchors.positive_weight < 0.0 {
            errors.push(ValidationError::new(
                "anchors.positive_weight",
                "Positive weight must be non-negative",
            ));
        }

        if config.anchors.negative_weight < 0.0 {
            errors.push(ValidationError::new(
                "anchors.negative_weight",
                "Negative weight must be non-negative",
            ));
        }

        let balance = config.anchors.balance_threshold;
        if !(0.0..=2.0).contains(&balance) {
            errors.push(ValidationError::new(
                "anchors.balance_threshold",
                format!("Balance threshold must be between 0.0 and 2.0, got {}", balance),
            ));
        }
    }

    fn validate_search(config: &StrataConfig, errors: &mut Vec<ValidationError>) {
        if config.search.limit == 0 {
            errors.push(ValidationError::new(
                "search.limit",
                "Search limit must be greater than 0",
            ));
        }

        if config.search.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "search.candidate_multiplier",
                "Candidate multiplier must be greater than 0",
            ));
        }

        if config.search.timeout_ms == 0 {
            errors.push(ValidationError::new(
                "search.timeout_ms",
                "Dependency timeout must be greater than 0",
            ));
        }
    }

    fn validate_sessions(config: &StrataConfig, errors: &mut Vec<ValidationError>) {
        if config.sessions.max_sessions == 0 {
            errors.push(ValidationError::new(
                "sessions.max_sessions",
                "Max sessions must be greater than 0",
            ));
        }

        if config.sessions.ttl_secs < 0 {
            errors.push(ValidationError::new(
                "sessions.ttl_secs",
                "Session TTL must be non-negative",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = StrataConfig::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_weight_rejected() {
        let mut config = StrataConfig::default();
        config.fusion.dense_weight = 0.0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = StrataConfig::default();
        config.anchors.negative_filter_threshold = 1.5;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut config = StrataConfig::default();
        config.search.limit = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
