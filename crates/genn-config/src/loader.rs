// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones winning:
//! 1. TOML file (base values)
//! 2. Environment variables
//! 3. CLI arguments

use crate::{ConfigError, ConfigResult, GennConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "genn_configuration.toml";

/// Find the GeNN configuration file
///
/// Search order:
/// 1. `GENN_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("GENN_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by GENN_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "GeNN configuration file '{}' not found in any of these locations:\n{}\n\nSet GENN_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Call [`crate::validate_config`] on the result before use.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<GennConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: GennConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `GENN_MODEL_NAME` -> `model.name`
/// - `GENN_PRECISION` -> `model.precision`
/// - `GENN_TIME_PRECISION` -> `model.time_precision`
/// - `GENN_MODEL_PATH` -> `model.model_path`
/// - `GENN_FORCE_REBUILD` -> `model.force_rebuild`
/// - `GENN_BACKEND` -> `backend.name`
/// - `GENN_BUILD_JOBS` -> `build.jobs`
/// - `GENN_LOG_LEVEL` -> all three `logging.*_level` values
pub fn apply_environment_overrides(config: &mut GennConfig) {
    if let Ok(value) = env::var("GENN_MODEL_NAME") {
        config.model.name = value;
    }
    if let Ok(value) = env::var("GENN_PRECISION") {
        config.model.precision = value;
    }
    if let Ok(value) = env::var("GENN_TIME_PRECISION") {
        config.model.time_precision = Some(value);
    }
    if let Ok(value) = env::var("GENN_MODEL_PATH") {
        config.model.model_path = PathBuf::from(value);
    }
    if let Ok(value) = env::var("GENN_FORCE_REBUILD") {
        config.model.force_rebuild = parse_bool(&value);
    }

    if let Ok(value) = env::var("GENN_BACKEND") {
        config.backend.name = Some(value);
    }

    if let Ok(value) = env::var("GENN_BUILD_JOBS") {
        if let Ok(jobs) = value.parse::<usize>() {
            config.build.jobs = Some(jobs);
        }
    }

    if let Ok(value) = env::var("GENN_LOG_LEVEL") {
        config.logging.set_all(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"model.name": "va", "build.jobs": "8"}`)
pub fn apply_cli_overrides(config: &mut GennConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("model.name") {
        config.model.name = value.clone();
    }
    if let Some(value) = cli_args.get("model.precision") {
        config.model.precision = value.clone();
    }
    if let Some(value) = cli_args.get("model.time_precision") {
        config.model.time_precision = Some(value.clone());
    }
    if let Some(value) = cli_args.get("model.model_path") {
        config.model.model_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("model.force_rebuild") {
        config.model.force_rebuild = parse_bool(value);
    }
    if let Some(value) = cli_args.get("model.recording_timesteps") {
        if let Ok(timesteps) = value.parse::<u32>() {
            config.model.recording_timesteps = Some(timesteps);
        }
    }

    if let Some(value) = cli_args.get("backend.name") {
        config.backend.name = Some(value.clone());
    }

    if let Some(value) = cli_args.get("build.jobs") {
        if let Ok(jobs) = value.parse::<usize>() {
            config.build.jobs = Some(jobs);
        }
    }

    if let Some(value) = cli_args.get("logging.level") {
        config.logging.set_all(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("GENN_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("GENN_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("GENN_CONFIG_PATH", "/nonexistent/genn_configuration.toml");
        let result = find_config_file();
        env::remove_var("GENN_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let saved_precision = env::var("GENN_PRECISION").ok();
        env::remove_var("GENN_PRECISION");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[model]").unwrap();
        writeln!(file, "name = \"minimal\"").unwrap();
        writeln!(file, "precision = \"double\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.model.name, "minimal");
        assert_eq!(config.model.precision, "double");
        assert_eq!(config.model.dt, 0.1);

        if let Some(value) = saved_precision {
            env::set_var("GENN_PRECISION", value);
        }
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[model\nname =").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = GennConfig::default();

        env::set_var("GENN_BACKEND", "cuda");
        env::set_var("GENN_BUILD_JOBS", "12");
        env::set_var("GENN_LOG_LEVEL", "debug");

        apply_environment_overrides(&mut config);

        env::remove_var("GENN_BACKEND");
        env::remove_var("GENN_BUILD_JOBS");
        env::remove_var("GENN_LOG_LEVEL");

        assert_eq!(config.backend.name.as_deref(), Some("cuda"));
        assert_eq!(config.build.jobs, Some(12));
        assert_eq!(config.logging.genn_level, "debug");
        assert_eq!(config.logging.backend_level, "debug");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = GennConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("model.name".to_string(), "cli_model".to_string());
        cli_args.insert("model.recording_timesteps".to_string(), "500".to_string());
        cli_args.insert("build.jobs".to_string(), "not-a-number".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.model.name, "cli_model");
        assert_eq!(config.model.recording_timesteps, Some(500));
        assert_eq!(config.build.jobs, None);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[model]").unwrap();
        writeln!(file, "name = \"file_model\"").unwrap();
        writeln!(file, "precision = \"float\"").unwrap();

        env::set_var("GENN_MODEL_NAME", "env_model");
        env::set_var("GENN_PRECISION", "double");

        let mut cli_args = HashMap::new();
        cli_args.insert("model.name".to_string(), "cli_model".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("GENN_MODEL_NAME");
        env::remove_var("GENN_PRECISION");

        // CLI wins for name, env wins for precision (no CLI override)
        assert_eq!(config.model.name, "cli_model");
        assert_eq!(config.model.precision, "double");
    }
}
