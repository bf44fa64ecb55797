use crate::{config::models::ExtensionConfig, core::policy};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ConfigValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidRoutePattern { pattern: String, message: String },

    #[error("Validation failed:\n{message}")]
    ValidationFailed { message: String },
}

/// Extension configuration validator
pub struct ExtensionConfigValidator;

impl ExtensionConfigValidator {
    /// Validate the entire extension configuration, aggregating every issue
    /// into a single error.
    pub fn validate(config: &ExtensionConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.server.host.trim().is_empty() {
            errors.push(ConfigValidationError::MissingField {
                field: "server.host".to_string(),
            });
        }

        if let Some(0) = config.parse_limit {
            errors.push(ConfigValidationError::InvalidField {
                field: "parse_limit".to_string(),
                message: "body size limit must be greater than zero".to_string(),
            });
        }

        for pattern in config.route_configuration.keys() {
            if pattern.trim().is_empty() {
                errors.push(ConfigValidationError::InvalidRoutePattern {
                    pattern: pattern.clone(),
                    message: "pattern must not be empty".to_string(),
                });
                continue;
            }
            if let Err(e) = policy::compile_route_pattern(pattern) {
                errors.push(ConfigValidationError::InvalidRoutePattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                });
            }
        }

        if let Some(csp) = &config.csp {
            for (directive, sources) in &csp.directives {
                if sources.is_empty() {
                    errors.push(ConfigValidationError::InvalidField {
                        field: format!("csp.directives.{directive}"),
                        message: "directive must list at least one source".to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError::ValidationFailed {
                message: errors
                    .iter()
                    .map(|e| format!("  - {e}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{CspConfig, RoutePolicy};

    #[test]
    fn default_config_is_valid() {
        assert!(ExtensionConfigValidator::validate(&ExtensionConfig::default()).is_ok());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = ExtensionConfig::default();
        config.server.host = "  ".to_string();
        assert!(ExtensionConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn zero_parse_limit_is_rejected() {
        let mut config = ExtensionConfig::default();
        config.parse_limit = Some(0);
        let err = ExtensionConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("parse_limit"));
    }

    #[test]
    fn empty_route_pattern_is_rejected() {
        let mut config = ExtensionConfig::default();
        config
            .route_configuration
            .insert(String::new(), RoutePolicy::default());
        assert!(ExtensionConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn empty_csp_directive_is_rejected() {
        let mut config = ExtensionConfig::default();
        let mut csp = CspConfig::default();
        csp.directives.insert("default-src".to_string(), vec![]);
        config.csp = Some(csp);
        assert!(ExtensionConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn multiple_issues_are_aggregated() {
        let mut config = ExtensionConfig::default();
        config.server.host = String::new();
        config.parse_limit = Some(0);
        let err = ExtensionConfigValidator::validate(&config).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("server.host"));
        assert!(rendered.contains("parse_limit"));
    }
}
