// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GeNN Lifecycle
//!
//! Build / load / run state machine for GeNN models:
//! - [`GennModel`]: owns the description, the selected backend and, once
//!   loaded, the runtime
//! - device I/O dispatch (`push_*_to_device` / `pull_*_from_device`), legal only
//!   while loaded
//! - teardown with `end()`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use genn_lifecycle::GennModel;
//! use genn_model::{MatrixType, SynapseGroupBuilder, NO_PARAMS, NO_VARS};
//!
//! # fn main() -> genn_model::Result<()> {
//! let mut model = GennModel::new("float", "example")?;
//! model.add_neuron_population("Pop", 10, "SpikeSource", NO_PARAMS, NO_VARS)?;
//! model.add_synapse_population(
//!     SynapseGroupBuilder::new("Self", MatrixType::DENSE_INDIVIDUALG, "Pop", "Pop")
//!         .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)]),
//! )?;
//!
//! model.build("./", false)?;
//! model.load(None)?;
//! for _ in 0..100 {
//!     model.step_time()?;
//! }
//! model.end()?;
//! # Ok(())
//! # }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "config")]
pub mod config;
pub mod dispatch;
pub mod model;
pub mod options;
pub mod state;

pub use model::GennModel;
pub use options::GennModelOptions;
pub use state::LifecycleState;
