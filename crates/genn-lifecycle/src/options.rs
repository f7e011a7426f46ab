// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Construction options for [`GennModel`](crate::GennModel)

use genn_backend::PreferenceValue;
use genn_model::Precision;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::Level;

/// Options fixed when a model is created
///
/// Preferences are a flat name/value map; only names the selected backend
/// recognises are applied at build time.
#[derive(Debug, Clone)]
pub struct GennModelOptions {
    /// Explicit backend name, `None` to use preference order
    pub backend: Option<String>,
    /// Simulation time precision, `None` to follow the model precision
    pub time_precision: Option<Precision>,
    pub preferences: BTreeMap<String, PreferenceValue>,
    pub genn_log_level: Level,
    pub code_gen_log_level: Level,
    pub backend_log_level: Level,
    /// Location of backend support files, defaults to the model path
    pub share_path: Option<PathBuf>,
    /// Parallel make jobs, defaults to the physical core count
    pub jobs: Option<usize>,
    pub msbuild_configuration: Option<String>,
}

impl Default for GennModelOptions {
    fn default() -> Self {
        Self {
            backend: None,
            time_precision: None,
            preferences: BTreeMap::new(),
            genn_log_level: Level::WARN,
            code_gen_log_level: Level::WARN,
            backend_log_level: Level::WARN,
            share_path: None,
            jobs: None,
            msbuild_configuration: None,
        }
    }
}

impl GennModelOptions {
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    pub fn with_time_precision(mut self, precision: Precision) -> Self {
        self.time_precision = Some(precision);
        self
    }

    /// Override one backend preference
    pub fn with_preference(mut self, name: impl Into<String>, value: impl Into<PreferenceValue>) -> Self {
        self.preferences.insert(name.into(), value.into());
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }
}
