// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

use crate::{crate_target, CrateDebugFlags, CODEGEN_TARGET, DEPRECATION_TARGET};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingConfigError {
    #[error("Invalid log level for {field}: '{value}'")]
    InvalidLevel { field: String, value: String },
}

/// Log levels and destinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Lifecycle and model description
    pub genn_level: String,
    /// Code generation
    pub code_gen_level: String,
    pub backend_level: String,
    /// Level for crates without a target of their own
    pub default_level: String,
    /// Base directory for per-run log folders (file logging only)
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            genn_level: "warn".to_string(),
            code_gen_level: "warn".to_string(),
            backend_level: "warn".to_string(),
            default_level: "warn".to_string(),
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

fn parse_level(field: &str, value: &str) -> Result<Level, LoggingConfigError> {
    value
        .trim()
        .parse::<Level>()
        .map_err(|_| LoggingConfigError::InvalidLevel {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn level_directive(level: Level) -> String {
    level.to_string().to_lowercase()
}

impl LoggingConfig {
    pub fn from_levels(genn: Level, code_gen: Level, backend: Level) -> Self {
        LoggingConfig {
            genn_level: level_directive(genn),
            code_gen_level: level_directive(code_gen),
            backend_level: level_directive(backend),
            ..Default::default()
        }
    }

    /// Level per `tracing` target, with debug flags applied
    ///
    /// Deprecation warnings are never filtered below `warn`.
    pub fn target_levels(
        &self,
        flags: &CrateDebugFlags,
    ) -> Result<BTreeMap<String, Level>, LoggingConfigError> {
        let genn = parse_level("genn_level", &self.genn_level)?;
        let code_gen = parse_level("code_gen_level", &self.code_gen_level)?;
        let backend = parse_level("backend_level", &self.backend_level)?;

        let mut levels = BTreeMap::new();
        levels.insert("genn_model".to_string(), genn);
        levels.insert("genn_lifecycle".to_string(), genn);
        levels.insert("genn_config".to_string(), genn);
        levels.insert("genn_backend".to_string(), backend);
        levels.insert(CODEGEN_TARGET.to_string(), code_gen);
        levels.insert(DEPRECATION_TARGET.to_string(), genn.max(Level::WARN));

        for target in flags.targets() {
            let prefix = format!("{}::", target);
            for (name, level) in levels.iter_mut() {
                if *name == target || name.starts_with(&prefix) {
                    *level = (*level).max(Level::DEBUG);
                }
            }
            levels.entry(target).or_insert(Level::DEBUG);
        }
        Ok(levels)
    }

    /// `EnvFilter` directive string, e.g. `warn,genn_backend=info,...`
    pub fn filter_directives(&self, flags: &CrateDebugFlags) -> Result<String, LoggingConfigError> {
        let default = parse_level("default_level", &self.default_level)?;
        let mut directives = vec![level_directive(default)];
        for (target, level) in self.target_levels(flags)? {
            directives.push(format!("{}={}", target, level_directive(level)));
        }
        Ok(directives.join(","))
    }
}
