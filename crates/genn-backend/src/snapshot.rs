// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model snapshot
//!
//! Serialisable form of a finalized [`ModelSpec`]. The reference backend
//! writes it as `model.json` into the generated-code directory and its
//! runtime reads it back on `open`, so the snapshot is the contract between
//! code generation and the loaded runtime.

use genn_model::{
    MatrixType, ModelSpec, Population, PopulationKind, Precision, VarInit, VarLocation, VarRole,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the snapshot inside `{model}_CODE`
pub const SNAPSHOT_FILE: &str = "model.json";

/// How a variable is initialised, without code attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitSnapshot {
    Uninitialised,
    Constant { value: f64 },
    Values { values: Vec<f64> },
    Snippet { snippet: String, params: Vec<f64> },
}

impl From<&VarInit> for InitSnapshot {
    fn from(init: &VarInit) -> Self {
        match init {
            VarInit::Uninitialised => InitSnapshot::Uninitialised,
            VarInit::Constant(value) => InitSnapshot::Constant { value: *value },
            VarInit::Values(values) => InitSnapshot::Values {
                values: values.clone(),
            },
            VarInit::Snippet { snippet, params } => InitSnapshot::Snippet {
                snippet: snippet.name().to_string(),
                params: params.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSnapshot {
    pub name: String,
    pub type_name: String,
    pub role: VarRole,
    pub location: VarLocation,
    pub count: usize,
    pub init: InitSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgpSnapshot {
    pub name: String,
    pub type_name: String,
    pub needs_allocation: bool,
    pub used_in_init: bool,
}

/// Fields shared by every population kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub name: String,
    pub kind: PopulationKind,
    pub model: String,
    pub size: usize,
    pub vars: Vec<VarSnapshot>,
    pub egps: Vec<EgpSnapshot>,
}

impl PopulationSnapshot {
    fn of(population: &dyn Population) -> Self {
        Self {
            name: population.name().to_string(),
            kind: population.kind(),
            model: population.model_name().to_string(),
            size: population.size(),
            vars: population
                .vars()
                .iter()
                .map(|v| VarSnapshot {
                    name: v.name.clone(),
                    type_name: v.type_name.clone(),
                    role: v.role,
                    location: v.location,
                    count: v.count,
                    init: InitSnapshot::from(&v.init),
                })
                .collect(),
            egps: population
                .extra_global_params()
                .iter()
                .map(|e| EgpSnapshot {
                    name: e.name.clone(),
                    type_name: e.type_name.clone(),
                    needs_allocation: e.needs_allocation,
                    used_in_init: e.used_in_init,
                })
                .collect(),
        }
    }

    pub fn var(&self, name: &str) -> Option<&VarSnapshot> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn egp(&self, name: &str) -> Option<&EgpSnapshot> {
        self.egps.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGroupSnapshot {
    #[serde(flatten)]
    pub population: PopulationSnapshot,
    pub spike_recording: bool,
    pub spike_event_recording: bool,
}

/// Generative connectivity rule by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub snippet: String,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseGroupSnapshot {
    #[serde(flatten)]
    pub population: PopulationSnapshot,
    pub source: String,
    pub target: String,
    pub matrix_type: MatrixType,
    pub num_pre: usize,
    pub num_post: usize,
    pub max_row_length: usize,
    pub delay_steps: u32,
    pub connectivity: Option<ConnectivitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomUpdateSnapshot {
    #[serde(flatten)]
    pub population: PopulationSnapshot,
    pub update_group: String,
    pub transpose: bool,
}

/// Serialisable description of a finalized model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub name: String,
    pub precision: Precision,
    pub time_precision: Precision,
    pub dt: f64,
    pub timing: bool,
    pub seed: u64,
    pub neuron_groups: Vec<NeuronGroupSnapshot>,
    pub synapse_groups: Vec<SynapseGroupSnapshot>,
    pub current_sources: Vec<PopulationSnapshot>,
    pub custom_updates: Vec<CustomUpdateSnapshot>,
}

impl ModelSnapshot {
    pub fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            precision: spec.precision(),
            time_precision: spec.time_precision(),
            dt: spec.dt(),
            timing: spec.timing_enabled(),
            seed: spec.seed(),
            neuron_groups: spec
                .neuron_populations()
                .iter()
                .map(|ng| NeuronGroupSnapshot {
                    population: PopulationSnapshot::of(ng),
                    spike_recording: ng.spike_recording_enabled(),
                    spike_event_recording: ng.spike_event_recording_enabled(),
                })
                .collect(),
            synapse_groups: spec
                .synapse_populations()
                .iter()
                .map(|sg| SynapseGroupSnapshot {
                    population: PopulationSnapshot::of(sg),
                    source: sg.source().to_string(),
                    target: sg.target().to_string(),
                    matrix_type: sg.matrix_type(),
                    num_pre: sg.num_pre(),
                    num_post: sg.num_post(),
                    max_row_length: sg.max_row_length(),
                    delay_steps: sg.delay_steps(),
                    connectivity: sg.connectivity_init().map(|init| ConnectivitySnapshot {
                        snippet: init.snippet.name().to_string(),
                        params: init.params.clone(),
                    }),
                })
                .collect(),
            current_sources: spec
                .current_sources()
                .iter()
                .map(|cs| PopulationSnapshot::of(cs))
                .collect(),
            custom_updates: spec
                .custom_updates()
                .iter()
                .map(|cu| CustomUpdateSnapshot {
                    population: PopulationSnapshot::of(cu),
                    update_group: cu.update_group_name().to_string(),
                    transpose: cu.is_transpose(),
                })
                .collect(),
        }
    }

    /// Every population of every kind, in load order
    pub fn populations(&self) -> impl Iterator<Item = &PopulationSnapshot> {
        self.neuron_groups
            .iter()
            .map(|ng| &ng.population)
            .chain(self.synapse_groups.iter().map(|sg| &sg.population))
            .chain(self.current_sources.iter())
            .chain(self.custom_updates.iter().map(|cu| &cu.population))
    }

    pub fn population(&self, kind: PopulationKind, name: &str) -> Option<&PopulationSnapshot> {
        self.populations().find(|p| p.kind == kind && p.name == name)
    }

    pub fn recording_in_use(&self) -> bool {
        self.neuron_groups
            .iter()
            .any(|ng| ng.spike_recording || ng.spike_event_recording)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn read(path: &Path) -> genn_model::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
