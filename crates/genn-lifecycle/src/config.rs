// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Model construction from `genn_configuration.toml`

use crate::model::GennModel;
use crate::options::GennModelOptions;
use genn_backend::{BackendRegistry, PreferenceValue};
use genn_config::{validate_config, ConfigError, GennConfig, PreferenceSetting};
use genn_model::{GennError, Precision, Result};
use tracing::Level;

fn config_error(err: ConfigError) -> GennError {
    GennError::configuration(err.to_string())
}

fn parse_level(field: &str, value: &str) -> Result<Level> {
    value
        .parse::<Level>()
        .map_err(|_| GennError::configuration(format!("{} '{}' is not a log level", field, value)))
}

fn preference_value(setting: &PreferenceSetting) -> PreferenceValue {
    match setting {
        PreferenceSetting::Bool(v) => PreferenceValue::Bool(*v),
        PreferenceSetting::Int(v) => PreferenceValue::Int(*v),
        PreferenceSetting::Float(v) => PreferenceValue::Float(*v),
        PreferenceSetting::Str(v) => PreferenceValue::Str(v.clone()),
    }
}

impl GennModelOptions {
    /// Options described by a validated configuration
    pub fn from_config(config: &GennConfig) -> Result<Self> {
        let time_precision = config
            .model
            .time_precision
            .as_deref()
            .map(str::parse::<Precision>)
            .transpose()?;

        Ok(Self {
            backend: config.backend.name.clone(),
            time_precision,
            preferences: config
                .backend
                .preferences
                .iter()
                .map(|(name, setting)| (name.clone(), preference_value(setting)))
                .collect(),
            genn_log_level: parse_level("logging.genn_level", &config.logging.genn_level)?,
            code_gen_log_level: parse_level("logging.code_gen_level", &config.logging.code_gen_level)?,
            backend_log_level: parse_level("logging.backend_level", &config.logging.backend_level)?,
            share_path: config.build.share_path.clone(),
            jobs: config.build.jobs,
            msbuild_configuration: Some(config.build.msbuild_configuration.clone()),
        })
    }
}

impl GennModel {
    /// Create an unbuilt model from configuration, with the compiled-in backends
    ///
    /// Model-level settings (`dt`, `timing`, `seed`) are applied; the build
    /// path, `force_rebuild` and recording timesteps are read by the caller
    /// when it calls `build()` and `load()`.
    pub fn from_config(config: &GennConfig) -> Result<Self> {
        Self::from_config_with_registry(config, &BackendRegistry::with_defaults())
    }

    pub fn from_config_with_registry(config: &GennConfig, registry: &BackendRegistry) -> Result<Self> {
        validate_config(config).map_err(config_error)?;
        let options = GennModelOptions::from_config(config)?;

        let mut model = GennModel::with_registry(
            &config.model.precision,
            &config.model.name,
            options,
            registry,
        )?;
        model.set_dt(config.model.dt)?;
        model.set_timing(config.model.timing)?;
        model.set_seed(config.model.seed)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = GennConfig::default();
        config.model.time_precision = Some("double".to_string());
        config.backend.name = Some("single_threaded_cpu".to_string());
        config
            .backend
            .preferences
            .insert("optimize_code".to_string(), PreferenceSetting::Bool(false));
        config.logging.code_gen_level = "debug".to_string();
        config.build.jobs = Some(3);

        let options = GennModelOptions::from_config(&config).unwrap();
        assert_eq!(options.time_precision, Some(Precision::Double));
        assert_eq!(options.backend.as_deref(), Some("single_threaded_cpu"));
        assert_eq!(options.preferences["optimize_code"], PreferenceValue::Bool(false));
        assert_eq!(options.code_gen_log_level, Level::DEBUG);
        assert_eq!(options.jobs, Some(3));
    }

    #[test]
    fn test_model_from_config_applies_settings() {
        let mut config = GennConfig::default();
        config.model.name = "configured".to_string();
        config.model.dt = 0.5;
        config.model.seed = 7;

        let model = GennModel::from_config(&config).unwrap();
        assert_eq!(model.name(), "configured");
        assert_eq!(model.dt(), 0.5);
        assert_eq!(model.spec().seed(), 7);
        assert_eq!(model.backend_name(), "single_threaded_cpu");
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        let mut config = GennConfig::default();
        config.model.precision = "long double".to_string();

        let err = GennModel::from_config(&config).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
