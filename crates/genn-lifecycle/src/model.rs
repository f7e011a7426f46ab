// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GeNN model lifecycle
//!
//! [`GennModel`] owns one model description and drives it through
//! `Unbuilt -> Built -> Loaded`:
//! - `build()` freezes the description, generates code and runs the host
//!   toolchain when the backend needs one
//! - `load()` opens the artifact, allocates and initialises device state
//! - `end()` frees runtime-managed extra global parameters and drops the runtime
//!
//! Every transition refuses to re-enter a state. Device I/O lives in
//! [`crate::dispatch`].

use crate::options::GennModelOptions;
use crate::state::LifecycleState;
use genn_backend::{
    host_toolchain, Backend, BackendFactory, BackendRegistry, MemAlloc, Runtime, Timings,
    ToolchainKind,
};
use genn_model::{
    CurrentSourceModel, CustomUpdateModel, GennError, GroupRef, IntoModel, ModelSpec,
    NeuronModel, Population, PopulationHandle, PopulationKind, Precision, Result, SynapseGroupBuilder,
    VarInit, VarLocation, VarReference,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A spiking network model and its build/load lifecycle
pub struct GennModel {
    pub(crate) spec: ModelSpec,
    pub(crate) state: LifecycleState,
    /// Set on the first `build()` call, successful or not
    build_attempted: bool,
    options: GennModelOptions,
    factory: Arc<dyn BackendFactory>,
    backend: Option<Box<dyn Backend>>,
    pub(crate) runtime: Option<Box<dyn Runtime>>,
    model_path: Option<PathBuf>,
    mem_alloc: Option<MemAlloc>,
}

impl fmt::Debug for GennModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GennModel")
            .field("name", &self.spec.name())
            .field("state", &self.state)
            .field("backend", &self.factory.name())
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl GennModel {
    /// Create a model with default options and the compiled-in backends
    ///
    /// `precision` is `"float"` or `"double"`.
    pub fn new(precision: &str, name: &str) -> Result<Self> {
        Self::with_options(precision, name, GennModelOptions::default())
    }

    pub fn with_options(precision: &str, name: &str, options: GennModelOptions) -> Result<Self> {
        Self::with_registry(precision, name, options, &BackendRegistry::with_defaults())
    }

    /// Create a model selecting its backend from `registry`
    ///
    /// Backend selection happens here, so an unavailable host fails before
    /// any description work is done.
    pub fn with_registry(
        precision: &str,
        name: &str,
        options: GennModelOptions,
        registry: &BackendRegistry,
    ) -> Result<Self> {
        let precision: Precision = precision.parse()?;
        let time_precision = options.time_precision.unwrap_or(precision);
        let decision = registry.select(options.backend.as_deref())?;

        info!(
            target: "genn_lifecycle",
            "Created model '{}' ({} precision, {} time) on backend '{}'",
            name,
            precision,
            time_precision,
            decision.factory.name()
        );
        debug!(target: "genn_lifecycle", "Backend decision: {}", decision.reason);

        Ok(Self {
            spec: ModelSpec::with_time_precision(name, precision, time_precision),
            state: LifecycleState::Unbuilt,
            build_attempted: false,
            options,
            factory: decision.factory,
            backend: None,
            runtime: None,
            model_path: None,
            mem_alloc: None,
        })
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state.is_built()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Name of the backend chosen at construction
    pub fn backend_name(&self) -> &str {
        self.factory.name()
    }

    pub fn options(&self) -> &GennModelOptions {
        &self.options
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Mutable description access; structural changes fail once built
    pub fn spec_mut(&mut self) -> &mut ModelSpec {
        &mut self.spec
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Memory summary returned by the last successful build
    pub fn mem_alloc(&self) -> Option<&MemAlloc> {
        self.mem_alloc.as_ref()
    }

    pub fn precision(&self) -> Precision {
        self.spec.precision()
    }

    pub fn time_precision(&self) -> Precision {
        self.spec.time_precision()
    }

    pub fn dt(&self) -> f64 {
        self.spec.dt()
    }

    pub fn set_dt(&mut self, dt: f64) -> Result<()> {
        self.spec.set_dt(dt)
    }

    pub fn set_timing(&mut self, timing: bool) -> Result<()> {
        self.spec.set_timing(timing)
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.spec.set_seed(seed)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn add_neuron_population<M, P, PK, V, VK, VI>(
        &mut self,
        name: &str,
        num_neurons: usize,
        model: M,
        params: P,
        vars: V,
    ) -> Result<PopulationHandle>
    where
        M: IntoModel<NeuronModel>,
        P: IntoIterator<Item = (PK, f64)>,
        PK: AsRef<str>,
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.spec
            .add_neuron_population(name, num_neurons, model, params, vars)
    }

    pub fn add_synapse_population(&mut self, builder: SynapseGroupBuilder) -> Result<PopulationHandle> {
        self.spec.add_synapse_population(builder)
    }

    pub fn add_current_source<M, G, P, PK, V, VK, VI>(
        &mut self,
        name: &str,
        model: M,
        pop: G,
        params: P,
        vars: V,
    ) -> Result<PopulationHandle>
    where
        M: IntoModel<CurrentSourceModel>,
        G: GroupRef,
        P: IntoIterator<Item = (PK, f64)>,
        PK: AsRef<str>,
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.spec.add_current_source(name, model, pop, params, vars)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_custom_update<M, P, PK, V, VK, VI, R, RK>(
        &mut self,
        name: &str,
        update_group_name: &str,
        model: M,
        params: P,
        vars: V,
        var_refs: R,
    ) -> Result<PopulationHandle>
    where
        M: IntoModel<CustomUpdateModel>,
        P: IntoIterator<Item = (PK, f64)>,
        PK: AsRef<str>,
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
        R: IntoIterator<Item = (RK, VarReference)>,
        RK: AsRef<str>,
    {
        self.spec
            .add_custom_update(name, update_group_name, model, params, vars, var_refs)
    }

    pub fn set_var_location(
        &mut self,
        group: impl GroupRef,
        var: &str,
        location: VarLocation,
    ) -> Result<()> {
        self.spec.set_var_location(group, var, location)
    }

    pub fn set_spike_recording_enabled(&mut self, pop: impl GroupRef, enabled: bool) -> Result<()> {
        self.spec.set_spike_recording_enabled(pop, enabled)
    }

    pub fn set_spike_event_recording_enabled(
        &mut self,
        pop: impl GroupRef,
        enabled: bool,
    ) -> Result<()> {
        self.spec.set_spike_event_recording_enabled(pop, enabled)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Finalize the description, generate code into `model_path` and build it
    ///
    /// Only one build is ever attempted per model. A failure leaves the
    /// generated directory on disk and the model unbuilt for good.
    pub fn build(&mut self, model_path: impl AsRef<Path>, force_rebuild: bool) -> Result<MemAlloc> {
        if self.build_attempted {
            return Err(GennError::state(format!(
                "Model '{}' has already been built",
                self.spec.name()
            )));
        }
        self.build_attempted = true;

        let model_path = model_path.as_ref().to_path_buf();
        info!(
            target: "genn_lifecycle",
            "Building model '{}' into {}",
            self.spec.name(),
            model_path.display()
        );

        if !self.spec.is_finalized() {
            self.spec.finalize()?;
        }

        let mut preferences = self.factory.default_preferences();
        preferences.apply_overrides(self.options.preferences.iter().map(|(k, v)| (k.as_str(), v)))?;

        let backend = self.factory.create_backend(
            &self.spec,
            &model_path,
            self.options.backend_log_level,
            preferences,
        )?;

        let share_path = self
            .options
            .share_path
            .clone()
            .unwrap_or_else(|| model_path.clone());
        let mem_alloc = backend.generate_code(&self.spec, &share_path, &model_path, force_rebuild)?;
        info!(target: "genn_lifecycle", "Memory required: {}", mem_alloc);

        match backend.toolchain() {
            ToolchainKind::Host => {
                let code_dir = model_path.join(format!("{}_CODE", self.spec.name()));
                let toolchain = host_toolchain(
                    self.options.jobs,
                    self.options.msbuild_configuration.as_deref(),
                );
                toolchain.build(&code_dir)?;
            }
            ToolchainKind::InProcess => {
                debug!(
                    target: "genn_lifecycle",
                    "Backend '{}' needs no host build step",
                    backend.name()
                );
            }
        }

        self.backend = Some(backend);
        self.model_path = Some(model_path);
        self.mem_alloc = Some(mem_alloc);
        self.state = LifecycleState::Built;
        Ok(mem_alloc)
    }

    /// Load the built model from the path it was built into
    ///
    /// `recording_timesteps` is required when any population records spikes.
    pub fn load(&mut self, recording_timesteps: Option<u32>) -> Result<()> {
        self.ensure_loadable()?;
        let model_path = self
            .model_path
            .clone()
            .ok_or_else(|| GennError::state("Model has no build output"))?;
        self.load_from(&model_path, recording_timesteps)
    }

    /// Load the built model's artifact from `path`
    pub fn load_from(&mut self, path: impl AsRef<Path>, recording_timesteps: Option<u32>) -> Result<()> {
        self.ensure_loadable()?;
        let path = path.as_ref();

        let recording_timesteps = if self.spec.recording_in_use() {
            match recording_timesteps {
                Some(timesteps) if timesteps > 0 => Some(timesteps),
                _ => {
                    return Err(GennError::configuration(
                        "Cannot use recording system without passing number of recording timesteps to load",
                    ))
                }
            }
        } else {
            None
        };

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| GennError::state("Model has no backend"))?;
        info!(
            target: "genn_lifecycle",
            "Loading model '{}' from {}",
            self.spec.name(),
            path.display()
        );

        let mut runtime = backend.create_runtime()?;
        runtime.open(path, self.spec.name())?;
        runtime.allocate_mem()?;
        if let Some(timesteps) = recording_timesteps {
            debug!(target: "genn_lifecycle", "Allocating recording buffers for {} timesteps", timesteps);
            runtime.allocate_recording_buffers(timesteps)?;
        }

        for kind in PopulationKind::ALL {
            load_init_egps(&self.spec, runtime.as_mut(), kind)?;
        }
        runtime.initialize()?;

        for kind in PopulationKind::ALL {
            load_populations(&mut self.spec, runtime.as_mut(), kind)?;
        }
        runtime.initialize_sparse()?;

        self.runtime = Some(runtime);
        self.state = LifecycleState::Loaded;
        info!(target: "genn_lifecycle", "Model '{}' loaded", self.spec.name());
        Ok(())
    }

    fn ensure_loadable(&self) -> Result<()> {
        match self.state {
            LifecycleState::Unbuilt => Err(GennError::state(format!(
                "Model '{}' must be built before it can be loaded",
                self.spec.name()
            ))),
            LifecycleState::Loaded => Err(GennError::state(format!(
                "Model '{}' is already loaded",
                self.spec.name()
            ))),
            LifecycleState::Built => Ok(()),
        }
    }

    /// Free runtime-managed extra global parameters and release the runtime
    pub fn end(mut self) -> Result<()> {
        let Some(mut runtime) = self.runtime.take() else {
            debug!(target: "genn_lifecycle", "Model '{}' was never loaded", self.spec.name());
            return Ok(());
        };

        for kind in PopulationKind::ALL {
            for population in self.spec.populations(kind) {
                for egp in population.extra_global_params() {
                    if egp.needs_allocation {
                        runtime.free_extra_global_param(kind, population.name(), &egp.name)?;
                    }
                }
            }
        }
        info!(target: "genn_lifecycle", "Model '{}' unloaded", self.spec.name());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Runtime state
    // ------------------------------------------------------------------

    pub(crate) fn loaded_runtime(&self) -> Result<&dyn Runtime> {
        match (self.state, self.runtime.as_deref()) {
            (LifecycleState::Loaded, Some(runtime)) => Ok(runtime),
            _ => Err(GennError::state("model must be loaded first")),
        }
    }

    /// Description and runtime borrowed together for dispatch
    pub(crate) fn loaded_parts(&mut self) -> Result<(&mut ModelSpec, &mut Box<dyn Runtime>)> {
        match (self.state, self.runtime.as_mut()) {
            (LifecycleState::Loaded, Some(runtime)) => Ok((&mut self.spec, runtime)),
            _ => Err(GennError::state("model must be loaded first")),
        }
    }

    /// Simulation time in model time units
    pub fn t(&self) -> Result<f64> {
        Ok(self.loaded_runtime()?.time())
    }

    pub fn set_t(&mut self, t: f64) -> Result<()> {
        let (_, runtime) = self.loaded_parts()?;
        runtime.set_time(t);
        Ok(())
    }

    /// Number of timesteps simulated
    pub fn timestep(&self) -> Result<u64> {
        Ok(self.loaded_runtime()?.timestep())
    }

    pub fn set_timestep(&mut self, timestep: u64) -> Result<()> {
        let (_, runtime) = self.loaded_parts()?;
        runtime.set_timestep(timestep);
        Ok(())
    }

    /// Free device memory, when the backend can report it
    pub fn free_device_mem_bytes(&self) -> Result<Option<usize>> {
        Ok(self.loaded_runtime()?.free_device_mem_bytes())
    }

    /// Kernel timings; all zero unless timing was enabled before build
    pub fn timings(&self) -> Result<Timings> {
        Ok(self.loaded_runtime()?.timings())
    }

    pub fn neuron_update_time(&self) -> Result<f64> {
        Ok(self.timings()?.neuron_update)
    }

    pub fn init_time(&self) -> Result<f64> {
        Ok(self.timings()?.init)
    }

    pub fn init_sparse_time(&self) -> Result<f64> {
        Ok(self.timings()?.init_sparse)
    }

    pub fn presynaptic_update_time(&self) -> Result<f64> {
        Ok(self.timings()?.presynaptic_update)
    }

    pub fn postsynaptic_update_time(&self) -> Result<f64> {
        Ok(self.timings()?.postsynaptic_update)
    }

    pub fn synapse_dynamics_time(&self) -> Result<f64> {
        Ok(self.timings()?.synapse_dynamics)
    }

    /// Accumulated time spent in one custom update group
    pub fn custom_update_time(&self, group: &str) -> Result<f64> {
        let runtime = self.loaded_runtime()?;
        self.ensure_update_group(group, "custom_update_time")?;
        Ok(runtime.custom_update_time(group).unwrap_or(0.0))
    }

    /// Accumulated time spent in transpose updates of one custom update group
    pub fn custom_update_transpose_time(&self, group: &str) -> Result<f64> {
        let runtime = self.loaded_runtime()?;
        self.ensure_update_group(group, "custom_update_transpose_time")?;
        Ok(runtime.custom_update_transpose_time(group).unwrap_or(0.0))
    }

    pub(crate) fn ensure_update_group(&self, group: &str, context: &str) -> Result<()> {
        if self.spec.custom_update_group_names().iter().any(|g| g == group) {
            Ok(())
        } else {
            Err(GennError::not_found("custom update group", group, context))
        }
    }
}

/// Allocate and upload the extra global parameters initialisers read
fn load_init_egps(spec: &ModelSpec, runtime: &mut dyn Runtime, kind: PopulationKind) -> Result<()> {
    for population in spec.populations(kind) {
        for egp in population.extra_global_params() {
            if egp.used_in_init && !egp.values.is_empty() {
                upload_egp(runtime, kind, population.name(), &egp.name, egp.needs_allocation, &egp.values)?;
            }
        }
    }
    Ok(())
}

/// Upload remaining host state, then mirror device-initialised state on the host
fn load_populations(spec: &mut ModelSpec, runtime: &mut dyn Runtime, kind: PopulationKind) -> Result<()> {
    for population in spec.populations_mut(kind) {
        let name = population.name().to_string();

        for egp in population.extra_global_params() {
            if !egp.used_in_init && !egp.values.is_empty() {
                upload_egp(runtime, kind, &name, &egp.name, egp.needs_allocation, &egp.values)?;
            }
        }

        let var_names: Vec<String> = population.vars().iter().map(|v| v.name.clone()).collect();
        for var_name in var_names {
            let Some(var) = population.var_mut(&var_name) else {
                continue;
            };
            if var.init.is_uninitialised() && !var.values.is_empty() {
                runtime.push_var(kind, &name, &var.name, &var.values)?;
            } else if var.location.on_host() {
                var.values = runtime.pull_var(kind, &name, &var.name)?;
            }
        }
    }

    if kind == PopulationKind::SynapseGroup {
        for sg in spec.synapse_populations() {
            if let Some(connectivity) = &sg.connectivity {
                debug!(target: "genn_lifecycle", "Uploading explicit connectivity of '{}'", sg.name());
                runtime.push_connectivity(sg.name(), connectivity)?;
            }
        }
    }
    Ok(())
}

fn upload_egp(
    runtime: &mut dyn Runtime,
    kind: PopulationKind,
    pop: &str,
    egp: &str,
    needs_allocation: bool,
    values: &[f64],
) -> Result<()> {
    if needs_allocation {
        runtime.allocate_extra_global_param(kind, pop, egp, values.len())?;
    }
    runtime.push_extra_global_param(kind, pop, egp, values)
}
