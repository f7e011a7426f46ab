// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Backend and backend-factory interfaces

use crate::mem_alloc::MemAlloc;
use crate::preferences::Preferences;
use crate::runtime::Runtime;
use crate::toolchain::ToolchainKind;
use genn_model::{ModelSpec, Result};
use std::path::Path;
use tracing::Level;

/// An execution target configured for one model
pub trait Backend {
    fn name(&self) -> &str;

    /// Preferences in effect, defaults merged with caller overrides
    fn preferences(&self) -> &Preferences;

    /// Generate code for a finalized model into `output_path`
    fn generate_code(
        &self,
        spec: &ModelSpec,
        share_path: &Path,
        output_path: &Path,
        force_rebuild: bool,
    ) -> Result<MemAlloc>;

    /// How the generated code is turned into something loadable
    fn toolchain(&self) -> ToolchainKind;

    /// A fresh, unopened runtime for the generated artifact
    fn create_runtime(&self) -> Result<Box<dyn Runtime>>;
}

/// Entry in the backend registry
///
/// Factories are compiled in; availability is a runtime capability probe
/// (for example, whether a compatible device is present).
pub trait BackendFactory: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Recognised preferences with their defaults
    fn default_preferences(&self) -> Preferences;

    fn create_backend(
        &self,
        spec: &ModelSpec,
        output_path: &Path,
        log_level: Level,
        preferences: Preferences,
    ) -> Result<Box<dyn Backend>>;
}
