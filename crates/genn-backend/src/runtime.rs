// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Compiled-artifact runtime interface
//!
//! A runtime owns every device buffer of one loaded model. Populations are
//! addressed by `(kind, name)` since names are only unique within a kind.

use genn_model::{PopulationKind, Result, SparseConnectivity};
use std::path::Path;

/// Per-phase kernel timings in seconds, read after a run for profiling
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    pub neuron_update: f64,
    pub init: f64,
    pub init_sparse: f64,
    pub presynaptic_update: f64,
    pub postsynaptic_update: f64,
    pub synapse_dynamics: f64,
}

/// Spikes recorded for one neuron population, decoded as `(time, neuron index)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedSpikes {
    pub population: String,
    pub spikes: Vec<(f64, u32)>,
    pub spike_events: Vec<(f64, u32)>,
}

/// Primitives exposed by a loaded model
pub trait Runtime {
    /// Open the compiled artifact for `model_name` under `path`
    fn open(&mut self, path: &Path, model_name: &str) -> Result<()>;

    fn allocate_mem(&mut self) -> Result<()>;

    /// Allocate spike recording buffers for `timesteps` steps
    fn allocate_recording_buffers(&mut self, timesteps: u32) -> Result<()>;

    /// Run variable and dense-connectivity initialisation
    fn initialize(&mut self) -> Result<()>;

    /// Run sparse-connectivity initialisation and upload host-side state
    fn initialize_sparse(&mut self) -> Result<()>;

    /// Advance the simulation by one timestep
    fn step_time(&mut self) -> Result<()>;

    /// Run every custom update in the named group
    fn custom_update(&mut self, group: &str) -> Result<()>;

    fn push_var(&mut self, kind: PopulationKind, pop: &str, var: &str, values: &[f64]) -> Result<()>;

    fn pull_var(&mut self, kind: PopulationKind, pop: &str, var: &str) -> Result<Vec<f64>>;

    /// Spikes emitted at every delay slot of a neuron population
    fn push_spikes(&mut self, pop: &str, spikes: &[u32]) -> Result<()>;

    fn pull_spikes(&mut self, pop: &str) -> Result<Vec<u32>>;

    /// Spikes of the current delay slot only
    fn push_current_spikes(&mut self, pop: &str, spikes: &[u32]) -> Result<()>;

    fn pull_current_spikes(&mut self, pop: &str) -> Result<Vec<u32>>;

    fn push_spike_events(&mut self, pop: &str, events: &[u32]) -> Result<()>;

    fn push_current_spike_events(&mut self, pop: &str, events: &[u32]) -> Result<()>;

    fn push_connectivity(&mut self, pop: &str, connectivity: &SparseConnectivity) -> Result<()>;

    fn pull_connectivity(&mut self, pop: &str) -> Result<SparseConnectivity>;

    /// Allocate `count` elements for a runtime-managed extra global parameter
    fn allocate_extra_global_param(
        &mut self,
        kind: PopulationKind,
        pop: &str,
        egp: &str,
        count: usize,
    ) -> Result<()>;

    fn push_extra_global_param(
        &mut self,
        kind: PopulationKind,
        pop: &str,
        egp: &str,
        values: &[f64],
    ) -> Result<()>;

    fn pull_extra_global_param(&mut self, kind: PopulationKind, pop: &str, egp: &str) -> Result<Vec<f64>>;

    fn free_extra_global_param(&mut self, kind: PopulationKind, pop: &str, egp: &str) -> Result<()>;

    /// Copy recording buffers to the host and decode them
    fn pull_recording_buffers(&mut self) -> Result<Vec<RecordedSpikes>>;

    fn time(&self) -> f64;

    fn set_time(&mut self, t: f64);

    fn timestep(&self) -> u64;

    fn set_timestep(&mut self, timestep: u64);

    /// Free device memory, when the backend can report it
    fn free_device_mem_bytes(&self) -> Option<usize> {
        None
    }

    fn timings(&self) -> Timings;

    fn custom_update_time(&self, group: &str) -> Option<f64>;

    fn custom_update_transpose_time(&self, group: &str) -> Option<f64>;
}
