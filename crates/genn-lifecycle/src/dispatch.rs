// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device I/O dispatch
//!
//! Each operation resolves the population in the description, checks the
//! model is loaded, and forwards to the runtime primitive. Host-side values
//! live on the populations themselves.

use crate::model::GennModel;
use genn_model::{GennError, GroupRef, ModelSpec, PopulationKind, Result, SparseConnectivity};
use tracing::{debug, warn};

/// Population identity resolved from a name or handle
struct Target {
    kind: PopulationKind,
    name: String,
}

fn resolve(spec: &ModelSpec, pop: impl GroupRef) -> Result<Target> {
    let population = spec.population(pop, "pop")?;
    Ok(Target {
        kind: population.kind(),
        name: population.name().to_string(),
    })
}

fn resolve_neurons(spec: &ModelSpec, pop: impl GroupRef) -> Result<String> {
    let target = resolve(spec, pop)?;
    if target.kind != PopulationKind::NeuronGroup {
        return Err(GennError::invalid_model(format!(
            "Spikes are only held by neuron groups, but '{}' is a {}",
            target.name, target.kind
        )));
    }
    Ok(target.name)
}

fn resolve_sparse(spec: &ModelSpec, pop: impl GroupRef) -> Result<String> {
    let target = resolve(spec, pop)?;
    let sg = spec
        .synapse_population(&target.name)
        .filter(|_| target.kind == PopulationKind::SynapseGroup)
        .ok_or_else(|| GennError::not_found("synapse group", &target.name, "pop"))?;
    if !sg.matrix_type().is_sparse() {
        return Err(GennError::invalid_model(format!(
            "Connectivity can only be transferred for sparse synapse groups, '{}' is {:?}",
            target.name,
            sg.matrix_type()
        )));
    }
    Ok(target.name)
}

impl GennModel {
    /// Simulate one timestep
    pub fn step_time(&mut self) -> Result<()> {
        let (_, runtime) = self.loaded_parts()?;
        runtime.step_time()
    }

    /// Run every custom update in `group`
    pub fn custom_update(&mut self, group: &str) -> Result<()> {
        self.loaded_runtime()?;
        self.ensure_update_group(group, "custom_update")?;
        let (_, runtime) = self.loaded_parts()?;
        runtime.custom_update(group)
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    pub fn push_var_to_device(&mut self, pop: impl GroupRef, var: &str) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population(pop, "pop")?;
        let state = population
            .var(var)
            .ok_or_else(|| GennError::not_found("variable", var, population.name()))?;
        runtime.push_var(population.kind(), population.name(), var, &state.values)
    }

    pub fn pull_var_from_device(&mut self, pop: impl GroupRef, var: &str) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population_mut(pop, "pop")?;
        if population.var(var).is_none() {
            return Err(GennError::not_found("variable", var, population.name()));
        }
        let values = runtime.pull_var(population.kind(), population.name(), var)?;
        population.set_var_values(var, values);
        Ok(())
    }

    /// Push every variable of one population
    pub fn push_state_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population(pop, "pop")?;
        for state in population.vars() {
            runtime.push_var(population.kind(), population.name(), &state.name, &state.values)?;
        }
        Ok(())
    }

    /// Pull every variable of one population
    pub fn pull_state_from_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population_mut(pop, "pop")?;
        let kind = population.kind();
        let name = population.name().to_string();
        let var_names: Vec<String> = population.vars().iter().map(|v| v.name.clone()).collect();
        for var in var_names {
            let values = runtime.pull_var(kind, &name, &var)?;
            population.set_var_values(&var, values);
        }
        Ok(())
    }

    /// Host-side values of a variable, as of the last pull
    pub fn var_values(&self, pop: impl GroupRef, var: &str) -> Result<&[f64]> {
        let population = self.spec.population(pop, "pop")?;
        population
            .var_values(var)
            .ok_or_else(|| GennError::not_found("variable", var, population.name()))
    }

    /// Replace the host-side values of a variable
    pub fn set_var_values(&mut self, pop: impl GroupRef, var: &str, values: Vec<f64>) -> Result<()> {
        let population = self.spec.population_mut(pop, "pop")?;
        let name = population.name().to_string();
        let count = population
            .var(var)
            .ok_or_else(|| GennError::not_found("variable", var, &name))?
            .count;
        if values.len() != count {
            return Err(GennError::invalid_model(format!(
                "Variable '{}' of '{}' holds {} values, {} given",
                var,
                name,
                count,
                values.len()
            )));
        }
        population.set_var_values(var, values);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Spikes
    // ------------------------------------------------------------------

    pub fn push_spikes_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let ng = spec.neuron_population(&name).ok_or_else(|| neurons_missing(&name))?;
        runtime.push_spikes(&name, &ng.spikes)
    }

    pub fn pull_spikes_from_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let spikes = runtime.pull_spikes(&name)?;
        let ng = spec.neuron_population_mut(&name).ok_or_else(|| neurons_missing(&name))?;
        ng.spikes = spikes;
        Ok(())
    }

    pub fn push_current_spikes_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let ng = spec.neuron_population(&name).ok_or_else(|| neurons_missing(&name))?;
        runtime.push_current_spikes(&name, &ng.spikes)
    }

    pub fn pull_current_spikes_from_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let spikes = runtime.pull_current_spikes(&name)?;
        let ng = spec.neuron_population_mut(&name).ok_or_else(|| neurons_missing(&name))?;
        ng.spikes = spikes;
        Ok(())
    }

    pub fn push_spike_events_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let ng = spec.neuron_population(&name).ok_or_else(|| neurons_missing(&name))?;
        runtime.push_spike_events(&name, &ng.spike_events)
    }

    pub fn push_current_spike_events_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_neurons(spec, pop)?;
        let ng = spec.neuron_population(&name).ok_or_else(|| neurons_missing(&name))?;
        runtime.push_current_spike_events(&name, &ng.spike_events)
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Upload the host-side sparse connectivity of a synapse group
    pub fn push_connectivity_to_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_sparse(spec, pop)?;
        let sg = spec
            .synapse_population(&name)
            .ok_or_else(|| GennError::not_found("synapse group", &name, "pop"))?;
        let connectivity = sg.connectivity.as_ref().ok_or_else(|| {
            GennError::invalid_model(format!(
                "Synapse group '{}' has no host-side connectivity to push",
                name
            ))
        })?;
        runtime.push_connectivity(&name, connectivity)
    }

    /// Download sparse connectivity into the synapse group's host view
    pub fn pull_connectivity_from_device(&mut self, pop: impl GroupRef) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let name = resolve_sparse(spec, pop)?;
        let connectivity: SparseConnectivity = runtime.pull_connectivity(&name)?;
        let sg = spec
            .synapse_population_mut(&name)
            .ok_or_else(|| GennError::not_found("synapse group", &name, "pop"))?;
        sg.connectivity = Some(connectivity);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Extra global parameters
    // ------------------------------------------------------------------

    /// Upload an extra global parameter, allocating it first if the runtime owns it
    ///
    /// `size` is the element count. Omitting it is deprecated: a single
    /// element is uploaded regardless of how much host data there is.
    pub fn push_extra_global_param_to_device(
        &mut self,
        pop: impl GroupRef,
        egp_name: &str,
        size: Option<usize>,
    ) -> Result<()> {
        let size = match size {
            Some(size) => size,
            None => {
                warn!(
                    target: "genn::deprecation",
                    "The default of size=1 is very counter-intuitive and will be removed in future; \
                     pass an explicit size when pushing extra global parameter '{}' of '{}'",
                    egp_name,
                    pop.to_selector().name
                );
                1
            }
        };

        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population(pop, "pop")?;
        let egp = population
            .extra_global_param(egp_name)
            .ok_or_else(|| GennError::not_found("extra global parameter", egp_name, population.name()))?;

        let mut values = egp.values.clone();
        values.resize(size, 0.0);
        debug!(
            target: "genn_lifecycle",
            "Pushing {} elements of '{}' on '{}'",
            size,
            egp_name,
            population.name()
        );
        if egp.needs_allocation {
            runtime.allocate_extra_global_param(population.kind(), population.name(), egp_name, size)?;
        }
        runtime.push_extra_global_param(population.kind(), population.name(), egp_name, &values)
    }

    pub fn pull_extra_global_param_from_device(&mut self, pop: impl GroupRef, egp_name: &str) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        let population = spec.population_mut(pop, "pop")?;
        if population.extra_global_param(egp_name).is_none() {
            return Err(GennError::not_found(
                "extra global parameter",
                egp_name,
                population.name(),
            ));
        }
        let values = runtime.pull_extra_global_param(population.kind(), population.name(), egp_name)?;
        population.set_extra_global_param(egp_name, values);
        Ok(())
    }

    /// Replace the host-side values of an extra global parameter
    ///
    /// Values set before `load()` are uploaded during loading.
    pub fn set_extra_global_param(&mut self, pop: impl GroupRef, egp_name: &str, values: Vec<f64>) -> Result<()> {
        let population = self.spec.population_mut(pop, "pop")?;
        if !population.set_extra_global_param(egp_name, values) {
            return Err(GennError::not_found(
                "extra global parameter",
                egp_name,
                population.name(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Download spike recording buffers into each recording population
    pub fn pull_recording_buffers_from_device(&mut self) -> Result<()> {
        let (spec, runtime) = self.loaded_parts()?;
        if !spec.recording_in_use() {
            return Err(GennError::configuration("Recording system is not in use"));
        }

        for recorded in runtime.pull_recording_buffers()? {
            let ng = spec
                .neuron_population_mut(&recorded.population)
                .ok_or_else(|| neurons_missing(&recorded.population))?;
            if ng.spike_recording_enabled() {
                ng.recorded_spikes = recorded.spikes;
            }
            if ng.spike_event_recording_enabled() {
                ng.recorded_spike_events = recorded.spike_events;
            }
        }
        Ok(())
    }
}

fn neurons_missing(name: &str) -> GennError {
    GennError::not_found("neuron group", name, "pop")
}
