// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Code generation for the reference backend: writes the model snapshot

use crate::mem_alloc::MemAlloc;
use crate::snapshot::{ModelSnapshot, SNAPSHOT_FILE};
use genn_model::{GennError, ModelSpec, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `{output_path}/{model}_CODE`
pub fn code_directory(output_path: &Path, model_name: &str) -> PathBuf {
    output_path.join(format!("{}_CODE", model_name))
}

/// Write the snapshot artifact, leaving an identical one untouched unless `force_rebuild`
pub fn generate(spec: &ModelSpec, output_path: &Path, force_rebuild: bool) -> Result<MemAlloc> {
    if !spec.is_finalized() {
        return Err(GennError::state(format!(
            "Model '{}' must be finalized before code generation",
            spec.name()
        )));
    }

    let code_dir = code_directory(output_path, spec.name());
    fs::create_dir_all(&code_dir).map_err(|e| {
        GennError::external_tool(
            "code generator",
            format!("cannot create {}: {}", code_dir.display(), e),
        )
    })?;

    let artifact = code_dir.join(SNAPSHOT_FILE);
    let contents = ModelSnapshot::from_spec(spec).to_json()?;

    let unchanged = !force_rebuild
        && fs::read_to_string(&artifact)
            .map(|existing| existing == contents)
            .unwrap_or(false);
    if unchanged {
        debug!(target: "genn_backend::codegen", "{} is up to date", artifact.display());
    } else {
        fs::write(&artifact, contents).map_err(|e| {
            GennError::external_tool(
                "code generator",
                format!("cannot write {}: {}", artifact.display(), e),
            )
        })?;
        info!(target: "genn_backend::codegen", "Generated {}", artifact.display());
    }

    MemAlloc::from_model(spec)
}
