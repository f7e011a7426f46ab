// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # `single_threaded_cpu` reference backend
//!
//! Runs on every host. Code generation serialises the finalized model into
//! the generated-code directory, there is no external compile step, and the
//! runtime keeps all "device" buffers in host memory.

mod codegen;
mod init;
mod runtime;

pub use codegen::code_directory;
pub use runtime::CpuRuntime;

use crate::backend::{Backend, BackendFactory};
use crate::mem_alloc::MemAlloc;
use crate::preferences::Preferences;
use crate::runtime::Runtime;
use crate::toolchain::ToolchainKind;
use genn_model::{ModelSpec, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

pub const BACKEND_NAME: &str = "single_threaded_cpu";

/// Device memory the runtime reports as its capacity, unless overridden
const DEFAULT_DEVICE_MEMORY_BYTES: i64 = 1 << 30;

/// Factory for [`SingleThreadedCpuBackend`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreadedCpuFactory;

impl BackendFactory for SingleThreadedCpuFactory {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_preferences(&self) -> Preferences {
        Preferences::new()
            .with("debug_code", false)
            .with("optimize_code", true)
            .with("device_memory_bytes", DEFAULT_DEVICE_MEMORY_BYTES)
    }

    fn create_backend(
        &self,
        spec: &ModelSpec,
        output_path: &Path,
        log_level: Level,
        preferences: Preferences,
    ) -> Result<Box<dyn Backend>> {
        debug!(
            target: "genn_backend",
            "Creating {} backend for '{}' (log level {})",
            BACKEND_NAME,
            spec.name(),
            log_level
        );
        Ok(Box::new(SingleThreadedCpuBackend {
            preferences,
            output_path: output_path.to_path_buf(),
        }))
    }
}

/// Reference backend configured for one model
#[derive(Debug, Clone)]
pub struct SingleThreadedCpuBackend {
    preferences: Preferences,
    output_path: PathBuf,
}

impl SingleThreadedCpuBackend {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Backend for SingleThreadedCpuBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    fn generate_code(
        &self,
        spec: &ModelSpec,
        share_path: &Path,
        output_path: &Path,
        force_rebuild: bool,
    ) -> Result<MemAlloc> {
        debug!(target: "genn_backend::codegen", "Share path {}", share_path.display());
        codegen::generate(spec, output_path, force_rebuild)
    }

    fn toolchain(&self) -> ToolchainKind {
        ToolchainKind::InProcess
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        let capacity = self
            .preferences
            .get_int("device_memory_bytes")
            .unwrap_or(DEFAULT_DEVICE_MEMORY_BYTES)
            .max(0) as usize;
        Ok(Box::new(CpuRuntime::new(capacity)))
    }
}
