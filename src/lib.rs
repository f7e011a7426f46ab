// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GeNN - model description, build and load lifecycle
//!
//! Describe a spiking neural network, generate code for it with one of the
//! registered backends, load the result and drive the simulation.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! genn = "0.1"
//! ```
//!
//! ```rust,no_run
//! use genn::prelude::*;
//!
//! let mut model = GennModel::new("float", "izhikevich")?;
//! model.add_neuron_population(
//!     "Pop",
//!     100,
//!     "Izhikevich",
//!     [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
//!     [("V", -65.0), ("U", -13.0)],
//! )?;
//! model.build("./", false)?;
//! model.load(None)?;
//! for _ in 0..1000 {
//!     model.step_time()?;
//! }
//! model.pull_var_from_device("Pop", "V")?;
//! # Ok::<(), genn::model::GennError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`config`** (default): build models from `genn_configuration.toml`
//! - **`file-logging`**: per-run log folders under `./logs`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Description: genn-model                                │
//! │  (populations, model kinds, ModelSpec, errors)          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Backends: genn-backend                                 │
//! │  (selection, code generation, toolchains, runtimes)     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Lifecycle: genn-lifecycle                              │
//! │  (build / load / run state machine, device I/O)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use genn_backend as backend;
pub use genn_lifecycle as lifecycle;
pub use genn_model as model;
pub use genn_observability as observability;

#[cfg(feature = "config")]
pub use genn_config as config;

use genn_lifecycle::GennModelOptions;
use genn_observability::{CrateDebugFlags, LoggingConfig};

/// Logging configuration carrying a model's three log levels
pub fn logging_config(options: &GennModelOptions) -> LoggingConfig {
    LoggingConfig::from_levels(
        options.genn_log_level,
        options.code_gen_log_level,
        options.backend_log_level,
    )
}

/// Install console logging at a model's levels, with debug flags from the
/// command line and `GENN_DEBUG`
pub fn init_logging(options: &GennModelOptions) -> anyhow::Result<()> {
    let flags: CrateDebugFlags = genn_observability::parse_debug_flags();
    genn_observability::init_logging(&logging_config(options), &flags)
}

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::backend::{BackendRegistry, MemAlloc, PreferenceValue, Timings};
    pub use crate::lifecycle::{GennModel, GennModelOptions, LifecycleState};
    pub use crate::model::{
        create_var_ref, create_wu_var_ref, init_connectivity, init_var, GennError, MatrixType,
        Population, PopulationHandle, Precision, SynapseGroupBuilder, VarInit, VarLocation,
        NO_PARAMS, NO_VARS,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let model = GennModel::new("double", "facade").unwrap();
        assert_eq!(model.state(), LifecycleState::Unbuilt);
    }

    #[test]
    fn test_logging_config_follows_options() {
        let options = GennModelOptions {
            code_gen_log_level: Level::DEBUG,
            ..Default::default()
        };
        let config = logging_config(&options);
        assert_eq!(config.genn_level, "warn");
        assert_eq!(config.code_gen_level, "debug");
    }
}
