// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every check runs and all problems are reported together.

use crate::{ConfigError, ConfigResult, GennConfig};

const PRECISIONS: [&str; 2] = ["float", "double"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &GennConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_precisions(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    validate_log_levels(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &GennConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.model.name.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "model.name".to_string(),
        });
    } else if !config
        .model
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        // The name becomes part of generated file and directory names
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.name".to_string(),
            reason: "must contain only letters, digits and '_'".to_string(),
        });
    }

    if let Some(backend) = &config.backend.name {
        if backend.is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: "backend.name".to_string(),
            });
        }
    }

    if config.build.msbuild_configuration.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "build.msbuild_configuration".to_string(),
        });
    }
}

fn validate_precisions(config: &GennConfig, errors: &mut Vec<ConfigValidationError>) {
    let check = |field: &str, value: &str, errors: &mut Vec<ConfigValidationError>| {
        if !PRECISIONS.contains(&value.trim().to_lowercase().as_str()) {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!("must be 'float' or 'double', got '{}'", value),
            });
        }
    };

    check("model.precision", &config.model.precision, errors);
    if let Some(time_precision) = &config.model.time_precision {
        check("model.time_precision", time_precision, errors);
    }
}

fn validate_value_ranges(config: &GennConfig, errors: &mut Vec<ConfigValidationError>) {
    if !(config.model.dt > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.dt".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    if config.model.recording_timesteps == Some(0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.recording_timesteps".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if config.build.jobs == Some(0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "build.jobs".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_log_levels(config: &GennConfig, errors: &mut Vec<ConfigValidationError>) {
    let levels = [
        ("logging.genn_level", &config.logging.genn_level),
        ("logging.code_gen_level", &config.logging.code_gen_level),
        ("logging.backend_level", &config.logging.backend_level),
    ];
    for (field, level) in levels {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!("must be one of {:?}", LOG_LEVELS),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GennConfig;

    #[test]
    fn test_default_config_is_valid() {
        let config = GennConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_long_double_rejected() {
        let mut config = GennConfig::default();
        config.model.precision = "long double".to_string();

        let result = validate_config(&config);
        assert!(result.is_err());

        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("model.precision"));
            assert!(msg.contains("long double"));
        }
    }

    #[test]
    fn test_invalid_model_name() {
        let mut config = GennConfig::default();
        config.model.name = "my model".to_string();

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("model.name"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_all_problems_reported() {
        let mut config = GennConfig::default();
        config.model.dt = 0.0;
        config.build.jobs = Some(0);
        config.logging.backend_level = "loud".to_string();

        let Err(ConfigError::ValidationError(msg)) = validate_config(&config) else {
            panic!("expected validation error");
        };
        assert!(msg.contains("model.dt"));
        assert!(msg.contains("build.jobs"));
        assert!(msg.contains("logging.backend_level"));
    }

    #[test]
    fn test_zero_recording_timesteps_rejected() {
        let mut config = GennConfig::default();
        config.model.recording_timesteps = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
