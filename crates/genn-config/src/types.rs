// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `genn_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GennConfig {
    pub model: ModelConfig,
    pub backend: BackendConfig,
    pub build: BuildConfig,
    pub logging: LoggingConfig,
}

/// Model-level settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// `float` or `double`
    pub precision: String,
    /// Defaults to `precision`
    pub time_precision: Option<String>,
    pub dt: f64,
    /// Directory the `{name}_CODE` directory is generated under
    pub model_path: PathBuf,
    pub force_rebuild: bool,
    pub timing: bool,
    /// 0 draws a seed at load time
    pub seed: u64,
    /// Required when any population records spikes
    pub recording_timesteps: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "model".to_string(),
            precision: "float".to_string(),
            time_precision: None,
            dt: 0.1,
            model_path: PathBuf::from("./"),
            force_rebuild: false,
            timing: false,
            seed: 0,
            recording_timesteps: None,
        }
    }
}

/// Backend selection and preference overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Explicit backend, absent to use the preference order
    pub name: Option<String>,
    /// Flat preference overrides; names the backend does not recognise are ignored
    pub preferences: BTreeMap<String, PreferenceSetting>,
}

/// One backend preference value as written in TOML
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PreferenceSetting {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for PreferenceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceSetting::Bool(v) => write!(f, "{}", v),
            PreferenceSetting::Int(v) => write!(f, "{}", v),
            PreferenceSetting::Float(v) => write!(f, "{}", v),
            PreferenceSetting::Str(v) => f.write_str(v),
        }
    }
}

/// Host build step settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Parallel make jobs, absent for the physical core count
    pub jobs: Option<usize>,
    pub msbuild_configuration: String,
    /// Backend support files, absent to use the model path
    pub share_path: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            msbuild_configuration: "Release".to_string(),
            share_path: None,
        }
    }
}

/// Log levels for the lifecycle, code generator and backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub genn_level: String,
    pub code_gen_level: String,
    pub backend_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            genn_level: "warn".to_string(),
            code_gen_level: "warn".to_string(),
            backend_level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Set all three levels at once
    pub fn set_all(&mut self, level: &str) {
        self.genn_level = level.to_string();
        self.code_gen_level = level.to_string();
        self.backend_level = level.to_string();
    }
}
