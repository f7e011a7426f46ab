// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GeNN Backends
//!
//! Uniform surface over the execution backends:
//! - [`BackendFactory`] / [`Backend`]: code generation for one model
//! - [`Runtime`]: device I/O primitives of a loaded model
//! - [`Toolchain`]: host build step (`make` or `msbuild`)
//! - [`BackendRegistry`]: preference-ordered selection by capability probe
//!
//! The `single_threaded_cpu` reference backend is always compiled in.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod mem_alloc;
pub mod preferences;
pub mod runtime;
pub mod selector;
pub mod single_threaded_cpu;
pub mod snapshot;
pub mod toolchain;

pub use backend::{Backend, BackendFactory};
pub use mem_alloc::MemAlloc;
pub use preferences::{PreferenceValue, Preferences};
pub use runtime::{RecordedSpikes, Runtime, Timings};
pub use selector::{BackendDecision, BackendRegistry};
pub use single_threaded_cpu::{CpuRuntime, SingleThreadedCpuBackend, SingleThreadedCpuFactory};
pub use snapshot::ModelSnapshot;
pub use toolchain::{host_toolchain, MakeToolchain, MsBuildToolchain, Toolchain, ToolchainKind};
