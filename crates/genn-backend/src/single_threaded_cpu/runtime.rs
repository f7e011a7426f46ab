// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process runtime of the reference backend
//!
//! "Device" buffers are host vectors owned by the runtime. Variables and
//! extra global parameters are stored as `f64` regardless of their declared
//! type; sizes for the memory report use the declared types.

use super::init::{build_connectivity, sample_var};
use crate::runtime::{RecordedSpikes, Runtime, Timings};
use crate::snapshot::{InitSnapshot, ModelSnapshot, PopulationSnapshot, SNAPSHOT_FILE};
use ahash::AHashMap;
use genn_model::types::type_size_bytes;
use genn_model::{GennError, PopulationKind, Result, SparseConnectivity};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

type PopKey = (PopulationKind, String);

fn key(kind: PopulationKind, pop: &str) -> PopKey {
    (kind, pop.to_string())
}

/// Spike ids per timestep in a circular buffer
#[derive(Debug, Clone)]
struct RecordingRing {
    slots: Vec<Vec<u32>>,
}

impl RecordingRing {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Vec::new(); capacity],
        }
    }

    fn record(&mut self, timestep: u64, ids: &[u32]) {
        let capacity = self.slots.len() as u64;
        if capacity == 0 {
            return;
        }
        let slot = &mut self.slots[(timestep % capacity) as usize];
        slot.clear();
        slot.extend_from_slice(ids);
    }

    /// Decode the most recent `min(timestep, capacity)` steps as `(time, id)`
    fn decode(&self, timestep: u64, dt: f64) -> Vec<(f64, u32)> {
        let capacity = self.slots.len() as u64;
        let recorded = timestep.min(capacity);
        let mut out = Vec::new();
        for ts in (timestep - recorded)..timestep {
            let time = ts as f64 * dt;
            out.extend(self.slots[(ts % capacity) as usize].iter().map(|&id| (time, id)));
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
struct NeuronState {
    num_neurons: usize,
    spikes: Vec<u32>,
    spike_events: Vec<u32>,
    spike_ring: Option<RecordingRing>,
    event_ring: Option<RecordingRing>,
}

/// Runtime for models generated by the `single_threaded_cpu` backend
#[derive(Debug)]
pub struct CpuRuntime {
    device_memory_bytes: usize,
    artifact: Option<PathBuf>,
    snapshot: Option<ModelSnapshot>,
    allocated: bool,
    allocated_bytes: usize,
    vars: AHashMap<PopKey, AHashMap<String, Vec<f64>>>,
    egps: AHashMap<PopKey, AHashMap<String, Vec<f64>>>,
    neurons: AHashMap<String, NeuronState>,
    connectivity: AHashMap<String, SparseConnectivity>,
    recording_timesteps: Option<u32>,
    rng: StdRng,
    t: f64,
    timestep: u64,
    /// Kernel timers run only when the model was built with timing enabled
    timing: bool,
    timings: Timings,
    custom_update_times: AHashMap<String, f64>,
    custom_update_transpose_times: AHashMap<String, f64>,
    custom_update_counts: AHashMap<String, u64>,
}

impl CpuRuntime {
    pub fn new(device_memory_bytes: usize) -> Self {
        Self {
            device_memory_bytes,
            artifact: None,
            snapshot: None,
            allocated: false,
            allocated_bytes: 0,
            vars: AHashMap::new(),
            egps: AHashMap::new(),
            neurons: AHashMap::new(),
            connectivity: AHashMap::new(),
            recording_timesteps: None,
            rng: StdRng::seed_from_u64(0),
            t: 0.0,
            timestep: 0,
            timing: false,
            timings: Timings::default(),
            custom_update_times: AHashMap::new(),
            custom_update_transpose_times: AHashMap::new(),
            custom_update_counts: AHashMap::new(),
        }
    }

    /// Path of the opened artifact
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// How often each custom update group has run
    pub fn custom_update_count(&self, group: &str) -> u64 {
        self.custom_update_counts.get(group).copied().unwrap_or(0)
    }

    fn snapshot(&self) -> Result<&ModelSnapshot> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| GennError::runtime("Runtime has not been opened"))
    }

    fn ensure_allocated(&self) -> Result<()> {
        if !self.allocated {
            return Err(GennError::runtime("Device memory has not been allocated"));
        }
        Ok(())
    }

    fn population(&self, kind: PopulationKind, pop: &str) -> Result<&PopulationSnapshot> {
        self.snapshot()?
            .population(kind, pop)
            .ok_or_else(|| GennError::not_found(kind.as_str(), pop, "pop"))
    }

    fn var_buffer_mut(&mut self, kind: PopulationKind, pop: &str, var: &str) -> Result<&mut Vec<f64>> {
        self.ensure_allocated()?;
        self.vars
            .get_mut(&key(kind, pop))
            .ok_or_else(|| GennError::not_found(kind.as_str(), pop, "pop"))?
            .get_mut(var)
            .ok_or_else(|| GennError::not_found("variable", var, pop))
    }

    fn neuron_mut(&mut self, pop: &str) -> Result<&mut NeuronState> {
        self.ensure_allocated()?;
        self.neurons
            .get_mut(pop)
            .ok_or_else(|| GennError::not_found(PopulationKind::NeuronGroup.as_str(), pop, "pop"))
    }

    fn check_spike_ids(state: &NeuronState, pop: &str, ids: &[u32]) -> Result<()> {
        if let Some(bad) = ids.iter().find(|&&id| id as usize >= state.num_neurons) {
            return Err(GennError::runtime(format!(
                "Spike index {} out of range for '{}' ({} neurons)",
                bad, pop, state.num_neurons
            )));
        }
        Ok(())
    }

    fn egp_type_size(&self, kind: PopulationKind, pop: &str, egp: &str) -> Result<usize> {
        let snapshot = self.snapshot()?;
        let decl = self
            .population(kind, pop)?
            .egp(egp)
            .ok_or_else(|| GennError::not_found("extra global parameter", egp, pop))?;
        type_size_bytes(decl.type_name.trim_end_matches('*'), snapshot.precision)
    }
}

impl Runtime for CpuRuntime {
    fn open(&mut self, path: &Path, model_name: &str) -> Result<()> {
        let artifact = path.join(format!("{}_CODE", model_name)).join(SNAPSHOT_FILE);
        if !artifact.exists() {
            return Err(GennError::runtime(format!(
                "Compiled model not found at {}",
                artifact.display()
            )));
        }
        let snapshot = ModelSnapshot::read(&artifact)?;
        if snapshot.name != model_name {
            return Err(GennError::runtime(format!(
                "Artifact {} holds model '{}', expected '{}'",
                artifact.display(),
                snapshot.name,
                model_name
            )));
        }

        self.rng = if snapshot.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(snapshot.seed)
        };
        self.timing = snapshot.timing;
        info!(target: "genn_backend", "Opened {}", artifact.display());
        self.snapshot = Some(snapshot);
        self.artifact = Some(artifact);
        Ok(())
    }

    fn allocate_mem(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?.clone();
        let mut bytes = 0usize;

        for pop in snapshot.populations() {
            let mut vars = AHashMap::new();
            for var in &pop.vars {
                bytes += var.count * type_size_bytes(&var.type_name, snapshot.precision)?;
                vars.insert(var.name.clone(), vec![0.0; var.count]);
            }
            self.vars.insert(key(pop.kind, &pop.name), vars);
            self.egps.insert(key(pop.kind, &pop.name), AHashMap::new());
        }
        for ng in &snapshot.neuron_groups {
            bytes += 4 * (ng.population.size + 1);
            self.neurons.insert(
                ng.population.name.clone(),
                NeuronState {
                    num_neurons: ng.population.size,
                    ..Default::default()
                },
            );
        }

        self.allocated_bytes = bytes;
        self.allocated = true;
        debug!(target: "genn_backend", "Allocated {} bytes for model '{}'", bytes, snapshot.name);
        Ok(())
    }

    fn allocate_recording_buffers(&mut self, timesteps: u32) -> Result<()> {
        self.ensure_allocated()?;
        let snapshot = self.snapshot()?.clone();
        for ng in &snapshot.neuron_groups {
            let state = self.neuron_mut(&ng.population.name)?;
            if ng.spike_recording {
                state.spike_ring = Some(RecordingRing::new(timesteps as usize));
            }
            if ng.spike_event_recording {
                state.event_ring = Some(RecordingRing::new(timesteps as usize));
            }
            let words = (ng.population.size.div_ceil(32)) * timesteps as usize;
            let rings = ng.spike_recording as usize + ng.spike_event_recording as usize;
            self.allocated_bytes += 4 * words * rings;
        }
        self.recording_timesteps = Some(timesteps);
        debug!(target: "genn_backend", "Allocated recording buffers for {} timesteps", timesteps);
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.ensure_allocated()?;
        let start = self.timing.then(Instant::now);
        let snapshot = self.snapshot()?.clone();

        for pop in snapshot.populations() {
            for var in &pop.vars {
                let values = match &var.init {
                    InitSnapshot::Uninitialised => continue,
                    InitSnapshot::Constant { value } => vec![*value; var.count],
                    InitSnapshot::Values { values } => values.clone(),
                    InitSnapshot::Snippet { snippet, params } => {
                        sample_var(snippet, params, var.count, &mut self.rng)?
                    }
                };
                *self.var_buffer_mut(pop.kind, &pop.name, &var.name)? = values;
            }
        }

        for sg in &snapshot.synapse_groups {
            if let Some(conn) = &sg.connectivity {
                let built = build_connectivity(
                    &conn.snippet,
                    &conn.params,
                    sg.num_pre,
                    sg.num_post,
                    sg.max_row_length,
                    &mut self.rng,
                )?;
                trace!(
                    target: "genn_backend",
                    "'{}': {} synapses from {}",
                    sg.population.name,
                    built.num_synapses(),
                    conn.snippet
                );
                self.connectivity.insert(sg.population.name.clone(), built);
            }
        }

        if let Some(start) = start {
            self.timings.init += start.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn initialize_sparse(&mut self) -> Result<()> {
        self.ensure_allocated()?;
        let start = self.timing.then(Instant::now);
        let snapshot = self.snapshot()?.clone();
        for sg in snapshot.synapse_groups.iter().filter(|sg| sg.matrix_type.is_sparse()) {
            if !self.connectivity.contains_key(&sg.population.name) {
                return Err(GennError::runtime(format!(
                    "Sparse synapse population '{}' has no connectivity: set connections or an initialiser",
                    sg.population.name
                )));
            }
        }
        if let Some(start) = start {
            self.timings.init_sparse += start.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn step_time(&mut self) -> Result<()> {
        self.ensure_allocated()?;
        let start = self.timing.then(Instant::now);
        let timestep = self.timestep;
        for state in self.neurons.values_mut() {
            if let Some(ring) = &mut state.spike_ring {
                ring.record(timestep, &state.spikes);
            }
            if let Some(ring) = &mut state.event_ring {
                ring.record(timestep, &state.spike_events);
            }
            state.spikes.clear();
            state.spike_events.clear();
        }

        let dt = self.snapshot()?.dt;
        self.timestep += 1;
        self.t = self.timestep as f64 * dt;
        if let Some(start) = start {
            self.timings.neuron_update += start.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn custom_update(&mut self, group: &str) -> Result<()> {
        self.ensure_allocated()?;
        let start = self.timing.then(Instant::now);
        let snapshot = self.snapshot()?;
        let members: Vec<bool> = snapshot
            .custom_updates
            .iter()
            .filter(|cu| cu.update_group == group)
            .map(|cu| cu.transpose)
            .collect();
        if members.is_empty() {
            return Err(GennError::not_found("custom update group", group, "custom_update"));
        }

        *self.custom_update_counts.entry(group.to_string()).or_insert(0) += 1;
        let Some(start) = start else {
            return Ok(());
        };
        let elapsed = start.elapsed().as_secs_f64();
        *self.custom_update_times.entry(group.to_string()).or_insert(0.0) += elapsed;
        if members.iter().any(|&transpose| transpose) {
            *self
                .custom_update_transpose_times
                .entry(group.to_string())
                .or_insert(0.0) += elapsed;
        }
        Ok(())
    }

    fn push_var(&mut self, kind: PopulationKind, pop: &str, var: &str, values: &[f64]) -> Result<()> {
        let buffer = self.var_buffer_mut(kind, pop, var)?;
        if values.len() != buffer.len() {
            return Err(GennError::runtime(format!(
                "Variable '{}' of '{}' holds {} elements, {} pushed",
                var,
                pop,
                buffer.len(),
                values.len()
            )));
        }
        buffer.copy_from_slice(values);
        Ok(())
    }

    fn pull_var(&mut self, kind: PopulationKind, pop: &str, var: &str) -> Result<Vec<f64>> {
        Ok(self.var_buffer_mut(kind, pop, var)?.clone())
    }

    fn push_spikes(&mut self, pop: &str, spikes: &[u32]) -> Result<()> {
        self.push_current_spikes(pop, spikes)
    }

    fn pull_spikes(&mut self, pop: &str) -> Result<Vec<u32>> {
        self.pull_current_spikes(pop)
    }

    fn push_current_spikes(&mut self, pop: &str, spikes: &[u32]) -> Result<()> {
        let state = self.neuron_mut(pop)?;
        Self::check_spike_ids(state, pop, spikes)?;
        state.spikes = spikes.to_vec();
        Ok(())
    }

    fn pull_current_spikes(&mut self, pop: &str) -> Result<Vec<u32>> {
        Ok(self.neuron_mut(pop)?.spikes.clone())
    }

    fn push_spike_events(&mut self, pop: &str, events: &[u32]) -> Result<()> {
        self.push_current_spike_events(pop, events)
    }

    fn push_current_spike_events(&mut self, pop: &str, events: &[u32]) -> Result<()> {
        let state = self.neuron_mut(pop)?;
        Self::check_spike_ids(state, pop, events)?;
        state.spike_events = events.to_vec();
        Ok(())
    }

    fn push_connectivity(&mut self, pop: &str, connectivity: &SparseConnectivity) -> Result<()> {
        self.ensure_allocated()?;
        let sg = self
            .snapshot()?
            .synapse_groups
            .iter()
            .find(|sg| sg.population.name == pop)
            .ok_or_else(|| GennError::not_found(PopulationKind::SynapseGroup.as_str(), pop, "pop"))?;
        if connectivity.rows.len() != sg.num_pre
            || connectivity.max_row_length() > sg.max_row_length
        {
            return Err(GennError::runtime(format!(
                "Connectivity for '{}' must have {} rows of at most {} synapses",
                pop, sg.num_pre, sg.max_row_length
            )));
        }
        self.connectivity.insert(pop.to_string(), connectivity.clone());
        Ok(())
    }

    fn pull_connectivity(&mut self, pop: &str) -> Result<SparseConnectivity> {
        self.ensure_allocated()?;
        self.connectivity
            .get(pop)
            .cloned()
            .ok_or_else(|| GennError::runtime(format!("'{}' has no sparse connectivity", pop)))
    }

    fn allocate_extra_global_param(
        &mut self,
        kind: PopulationKind,
        pop: &str,
        egp: &str,
        count: usize,
    ) -> Result<()> {
        self.ensure_allocated()?;
        let size = self.egp_type_size(kind, pop, egp)?;
        let buffers = self
            .egps
            .get_mut(&key(kind, pop))
            .ok_or_else(|| GennError::not_found(kind.as_str(), pop, "pop"))?;
        if let Some(previous) = buffers.insert(egp.to_string(), vec![0.0; count]) {
            self.allocated_bytes = self.allocated_bytes.saturating_sub(previous.len() * size);
        }
        self.allocated_bytes += count * size;
        Ok(())
    }

    fn push_extra_global_param(
        &mut self,
        kind: PopulationKind,
        pop: &str,
        egp: &str,
        values: &[f64],
    ) -> Result<()> {
        self.ensure_allocated()?;
        let needs_allocation = self
            .population(kind, pop)?
            .egp(egp)
            .ok_or_else(|| GennError::not_found("extra global parameter", egp, pop))?
            .needs_allocation;
        let buffers = self
            .egps
            .get_mut(&key(kind, pop))
            .ok_or_else(|| GennError::not_found(kind.as_str(), pop, "pop"))?;

        match buffers.get_mut(egp) {
            Some(buffer) if values.len() <= buffer.len() => {
                buffer[..values.len()].copy_from_slice(values);
                Ok(())
            }
            Some(buffer) => Err(GennError::runtime(format!(
                "Extra global parameter '{}' of '{}' holds {} elements, {} pushed",
                egp,
                pop,
                buffer.len(),
                values.len()
            ))),
            None if !needs_allocation => {
                buffers.insert(egp.to_string(), values.to_vec());
                Ok(())
            }
            None => Err(GennError::runtime(format!(
                "Extra global parameter '{}' of '{}' has not been allocated",
                egp, pop
            ))),
        }
    }

    fn pull_extra_global_param(&mut self, kind: PopulationKind, pop: &str, egp: &str) -> Result<Vec<f64>> {
        self.ensure_allocated()?;
        self.egps
            .get(&key(kind, pop))
            .and_then(|buffers| buffers.get(egp))
            .cloned()
            .ok_or_else(|| GennError::not_found("extra global parameter", egp, pop))
    }

    fn free_extra_global_param(&mut self, kind: PopulationKind, pop: &str, egp: &str) -> Result<()> {
        let size = self.egp_type_size(kind, pop, egp)?;
        if let Some(freed) = self
            .egps
            .get_mut(&key(kind, pop))
            .and_then(|buffers| buffers.remove(egp))
        {
            self.allocated_bytes = self.allocated_bytes.saturating_sub(freed.len() * size);
            debug!(target: "genn_backend", "Freed extra global parameter '{}' of '{}'", egp, pop);
        }
        Ok(())
    }

    fn pull_recording_buffers(&mut self) -> Result<Vec<RecordedSpikes>> {
        self.ensure_allocated()?;
        if self.recording_timesteps.is_none() {
            return Err(GennError::runtime("Recording buffers have not been allocated"));
        }
        let snapshot = self.snapshot()?;
        let dt = snapshot.dt;
        let mut recorded = Vec::new();
        for ng in &snapshot.neuron_groups {
            let Some(state) = self.neurons.get(&ng.population.name) else {
                continue;
            };
            if state.spike_ring.is_none() && state.event_ring.is_none() {
                continue;
            }
            recorded.push(RecordedSpikes {
                population: ng.population.name.clone(),
                spikes: state
                    .spike_ring
                    .as_ref()
                    .map(|ring| ring.decode(self.timestep, dt))
                    .unwrap_or_default(),
                spike_events: state
                    .event_ring
                    .as_ref()
                    .map(|ring| ring.decode(self.timestep, dt))
                    .unwrap_or_default(),
            });
        }
        Ok(recorded)
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn set_time(&mut self, t: f64) {
        self.t = t;
    }

    fn timestep(&self) -> u64 {
        self.timestep
    }

    fn set_timestep(&mut self, timestep: u64) {
        self.timestep = timestep;
    }

    fn free_device_mem_bytes(&self) -> Option<usize> {
        Some(self.device_memory_bytes.saturating_sub(self.allocated_bytes))
    }

    fn timings(&self) -> Timings {
        self.timings
    }

    fn custom_update_time(&self, group: &str) -> Option<f64> {
        self.custom_update_times.get(group).copied()
    }

    fn custom_update_transpose_time(&self, group: &str) -> Option<f64> {
        self.custom_update_transpose_times.get(group).copied()
    }
}
