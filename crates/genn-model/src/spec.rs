// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model description
//!
//! [`ModelSpec`] accumulates the populations of one network. It owns one
//! registry per population kind and validates every registration against
//! them: referenced populations must already exist (by name or handle),
//! names are unique per kind, and parameters and variables must match the
//! declarations of the chosen model kind.
//!
//! Once [`ModelSpec::finalize`] has run, the structure is frozen. Host-side
//! values (initial variable values, EGP contents, explicit connectivity) can
//! still be changed through the population accessors.

use crate::error::{GennError, Result};
use crate::init::{resolve_params, resolve_var_inits, ConnectivityInit, ToeplitzInit, VarInit};
use crate::models::builtin::IntoModel;
use crate::models::{
    CurrentSourceModel, CustomUpdateModel, Egp, NeuronModel, PostsynapticModel, Var,
    WeightUpdateModel,
};
use crate::population::{
    CurrentSource, CustomUpdate, ExtraGlobalParam, GroupRef, GroupSelector, ModelId, NeuronGroup,
    Population, PopulationCore, PopulationHandle, PopulationKind, SynapseGroup, VarReference,
    VarRefTarget, VarRole, VarState,
};
use crate::registry::PopulationRegistry;
use crate::types::{type_size_bytes, MatrixType, Precision, VarLocation};
use std::sync::Arc;
use tracing::{debug, info};

/// Default simulation timestep in milliseconds
pub const DEFAULT_DT: f64 = 0.1;

type ParamList = Vec<(String, f64)>;
type VarList = Vec<(String, VarInit)>;

fn collect_params<I, K>(params: I) -> ParamList
where
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v))
        .collect()
}

fn collect_vars<I, K, V>(vars: I) -> VarList
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<VarInit>,
{
    vars.into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.into()))
        .collect()
}

/// Description of a synapse population, consumed by [`ModelSpec::add_synapse_population`]
///
/// ```ignore
/// let syn = SynapseGroupBuilder::new("Syn", MatrixType::SPARSE_INDIVIDUALG, "Pop", "Pop")
///     .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)])
///     .postsynaptic("DeltaCurr", NO_PARAMS, NO_VARS)
///     .connectivity(init_connectivity("OneToOne", NO_PARAMS)?);
/// ```
#[derive(Debug)]
pub struct SynapseGroupBuilder {
    name: String,
    matrix_type: MatrixType,
    delay_steps: u32,
    source: GroupSelector,
    target: GroupSelector,
    wu_model: Option<Result<Arc<WeightUpdateModel>>>,
    wu_params: ParamList,
    wu_vars: VarList,
    wu_pre_vars: VarList,
    wu_post_vars: VarList,
    ps_model: Option<Result<Arc<PostsynapticModel>>>,
    ps_params: ParamList,
    ps_vars: VarList,
    connectivity_init: Option<ConnectivityInit>,
    toeplitz_init: Option<ToeplitzInit>,
}

impl SynapseGroupBuilder {
    pub fn new(
        name: impl Into<String>,
        matrix_type: MatrixType,
        source: impl GroupRef,
        target: impl GroupRef,
    ) -> Self {
        Self {
            name: name.into(),
            matrix_type,
            delay_steps: 0,
            source: source.to_selector(),
            target: target.to_selector(),
            wu_model: None,
            wu_params: Vec::new(),
            wu_vars: Vec::new(),
            wu_pre_vars: Vec::new(),
            wu_post_vars: Vec::new(),
            ps_model: None,
            ps_params: Vec::new(),
            ps_vars: Vec::new(),
            connectivity_init: None,
            toeplitz_init: None,
        }
    }

    /// Axonal delay in timesteps
    pub fn delay_steps(mut self, delay_steps: u32) -> Self {
        self.delay_steps = delay_steps;
        self
    }

    /// Weight update model with its parameters and per-synapse variables
    pub fn weight_update<M, P, PK, V, VK, VI>(mut self, model: M, params: P, vars: V) -> Self
    where
        M: IntoModel<WeightUpdateModel>,
        P: IntoIterator<Item = (PK, f64)>,
        PK: AsRef<str>,
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.wu_model = Some(model.into_model());
        self.wu_params = collect_params(params);
        self.wu_vars = collect_vars(vars);
        self
    }

    /// Initialisers for the weight update model's presynaptic variables
    pub fn wu_pre_vars<V, VK, VI>(mut self, vars: V) -> Self
    where
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.wu_pre_vars = collect_vars(vars);
        self
    }

    /// Initialisers for the weight update model's postsynaptic variables
    pub fn wu_post_vars<V, VK, VI>(mut self, vars: V) -> Self
    where
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.wu_post_vars = collect_vars(vars);
        self
    }

    /// Postsynaptic model; `DeltaCurr` is used when none is given
    pub fn postsynaptic<M, P, PK, V, VK, VI>(mut self, model: M, params: P, vars: V) -> Self
    where
        M: IntoModel<PostsynapticModel>,
        P: IntoIterator<Item = (PK, f64)>,
        PK: AsRef<str>,
        V: IntoIterator<Item = (VK, VI)>,
        VK: AsRef<str>,
        VI: Into<VarInit>,
    {
        self.ps_model = Some(model.into_model());
        self.ps_params = collect_params(params);
        self.ps_vars = collect_vars(vars);
        self
    }

    pub fn connectivity(mut self, init: ConnectivityInit) -> Self {
        self.connectivity_init = Some(init);
        self
    }

    pub fn toeplitz_connectivity(mut self, init: ToeplitzInit) -> Self {
        self.toeplitz_init = Some(init);
        self
    }
}

/// Empty parameter list
pub const NO_PARAMS: [(&str, f64); 0] = [];
/// Empty variable list
pub const NO_VARS: [(&str, f64); 0] = [];

/// Description of one spiking network model
#[derive(Debug)]
pub struct ModelSpec {
    id: ModelId,
    name: String,
    precision: Precision,
    time_precision: Precision,
    dt: f64,
    timing: bool,
    seed: u64,
    finalized: bool,
    neuron_populations: PopulationRegistry<NeuronGroup>,
    synapse_populations: PopulationRegistry<SynapseGroup>,
    current_sources: PopulationRegistry<CurrentSource>,
    custom_updates: PopulationRegistry<CustomUpdate>,
}

impl ModelSpec {
    /// Create an empty description; time precision follows `precision`
    pub fn new(name: impl Into<String>, precision: Precision) -> Self {
        Self::with_time_precision(name, precision, precision)
    }

    pub fn with_time_precision(
        name: impl Into<String>,
        precision: Precision,
        time_precision: Precision,
    ) -> Self {
        Self {
            id: ModelId::next(),
            name: name.into(),
            precision,
            time_precision,
            dt: DEFAULT_DT,
            timing: false,
            seed: 0,
            finalized: false,
            neuron_populations: PopulationRegistry::new(PopulationKind::NeuronGroup),
            synapse_populations: PopulationRegistry::new(PopulationKind::SynapseGroup),
            current_sources: PopulationRegistry::new(PopulationKind::CurrentSource),
            custom_updates: PopulationRegistry::new(PopulationKind::CustomUpdate),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn time_precision(&self) -> Precision {
        self.time_precision
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn timing_enabled(&self) -> bool {
        self.timing
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn set_dt(&mut self, dt: f64) -> Result<()> {
        self.ensure_unfrozen("set dt")?;
        if !(dt > 0.0) {
            return Err(GennError::configuration(format!(
                "dt must be positive, got {}",
                dt
            )));
        }
        self.dt = dt;
        Ok(())
    }

    pub fn set_timing(&mut self, timing: bool) -> Result<()> {
        self.ensure_unfrozen("set timing")?;
        self.timing = timing;
        Ok(())
    }

    /// RNG seed; 0 draws a seed at load time
    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.ensure_unfrozen("set seed")?;
        self.seed = seed;
        Ok(())
    }

    fn ensure_unfrozen(&self, operation: &str) -> Result<()> {
        if self.finalized {
            return Err(GennError::state(format!(
                "Cannot {} on model '{}': description is already finalized",
                operation, self.name
            )));
        }
        Ok(())
    }

    pub fn neuron_populations(&self) -> &PopulationRegistry<NeuronGroup> {
        &self.neuron_populations
    }

    pub fn synapse_populations(&self) -> &PopulationRegistry<SynapseGroup> {
        &self.synapse_populations
    }

    pub fn current_sources(&self) -> &PopulationRegistry<CurrentSource> {
        &self.current_sources
    }

    pub fn custom_updates(&self) -> &PopulationRegistry<CustomUpdate> {
        &self.custom_updates
    }

    pub fn neuron_population(&self, name: &str) -> Option<&NeuronGroup> {
        self.neuron_populations.get(name)
    }

    pub fn neuron_population_mut(&mut self, name: &str) -> Option<&mut NeuronGroup> {
        self.neuron_populations.get_mut(name)
    }

    pub fn synapse_population(&self, name: &str) -> Option<&SynapseGroup> {
        self.synapse_populations.get(name)
    }

    pub fn synapse_population_mut(&mut self, name: &str) -> Option<&mut SynapseGroup> {
        self.synapse_populations.get_mut(name)
    }

    pub fn current_source(&self, name: &str) -> Option<&CurrentSource> {
        self.current_sources.get(name)
    }

    pub fn current_source_mut(&mut self, name: &str) -> Option<&mut CurrentSource> {
        self.current_sources.get_mut(name)
    }

    pub fn custom_update(&self, name: &str) -> Option<&CustomUpdate> {
        self.custom_updates.get(name)
    }

    pub fn custom_update_mut(&mut self, name: &str) -> Option<&mut CustomUpdate> {
        self.custom_updates.get_mut(name)
    }

    /// Every population of one kind, in registration order
    pub fn populations(&self, kind: PopulationKind) -> Vec<&dyn Population> {
        match kind {
            PopulationKind::NeuronGroup => self
                .neuron_populations
                .iter()
                .map(|p| p as &dyn Population)
                .collect(),
            PopulationKind::SynapseGroup => self
                .synapse_populations
                .iter()
                .map(|p| p as &dyn Population)
                .collect(),
            PopulationKind::CurrentSource => self
                .current_sources
                .iter()
                .map(|p| p as &dyn Population)
                .collect(),
            PopulationKind::CustomUpdate => self
                .custom_updates
                .iter()
                .map(|p| p as &dyn Population)
                .collect(),
        }
    }

    /// Mutable access to every population of one kind, for host-side values
    pub fn populations_mut(&mut self, kind: PopulationKind) -> Vec<&mut dyn Population> {
        match kind {
            PopulationKind::NeuronGroup => self
                .neuron_populations
                .iter_mut()
                .map(|p| p as &mut dyn Population)
                .collect(),
            PopulationKind::SynapseGroup => self
                .synapse_populations
                .iter_mut()
                .map(|p| p as &mut dyn Population)
                .collect(),
            PopulationKind::CurrentSource => self
                .current_sources
                .iter_mut()
                .map(|p| p as &mut dyn Population)
                .collect(),
            PopulationKind::CustomUpdate => self
                .custom_updates
                .iter_mut()
                .map(|p| p as &mut dyn Population)
                .collect(),
        }
    }

    /// Distinct custom update group names in registration order
    pub fn custom_update_group_names(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for cu in &self.custom_updates {
            if !groups.iter().any(|g| g == cu.update_group_name()) {
                groups.push(cu.update_group_name().to_string());
            }
        }
        groups
    }

    /// Any neuron population records spikes or spike-like events
    pub fn recording_in_use(&self) -> bool {
        self.neuron_populations.iter().any(NeuronGroup::recording_in_use)
    }

    /// Resolve a selector to a population name of the given kind
    fn resolve_name(
        &self,
        selector: &GroupSelector,
        kind: PopulationKind,
        context: &str,
    ) -> Result<String> {
        if let Some((model_id, handle_kind)) = selector.handle {
            if model_id != self.id {
                return Err(GennError::not_found(kind.as_str(), &selector.name, context));
            }
            if handle_kind != kind {
                return Err(GennError::invalid_model(format!(
                    "'{}' must be a {}, but {} '{}' was given",
                    context, kind, handle_kind, selector.name
                )));
            }
        }

        let exists = match kind {
            PopulationKind::NeuronGroup => self.neuron_populations.contains(&selector.name),
            PopulationKind::SynapseGroup => self.synapse_populations.contains(&selector.name),
            PopulationKind::CurrentSource => self.current_sources.contains(&selector.name),
            PopulationKind::CustomUpdate => self.custom_updates.contains(&selector.name),
        };
        if !exists {
            return Err(GennError::not_found(kind.as_str(), &selector.name, context));
        }
        Ok(selector.name.clone())
    }

    /// Look up a population of any kind.
    ///
    /// Handles select their own kind; bare names are searched in the fixed
    /// kind order (neuron groups, synapse groups, current sources, custom updates).
    pub fn population(&self, group: impl GroupRef, context: &str) -> Result<&dyn Population> {
        let selector = group.to_selector();
        let kind = self.selector_kind(&selector, context)?;
        let population: &dyn Population = match kind {
            PopulationKind::NeuronGroup => self.neuron_populations.require(&selector.name, context)?,
            PopulationKind::SynapseGroup => self.synapse_populations.require(&selector.name, context)?,
            PopulationKind::CurrentSource => self.current_sources.require(&selector.name, context)?,
            PopulationKind::CustomUpdate => self.custom_updates.require(&selector.name, context)?,
        };
        Ok(population)
    }

    pub fn population_mut(
        &mut self,
        group: impl GroupRef,
        context: &str,
    ) -> Result<&mut dyn Population> {
        let selector = group.to_selector();
        let kind = self.selector_kind(&selector, context)?;
        let population: &mut dyn Population = match kind {
            PopulationKind::NeuronGroup => {
                self.neuron_populations.require_mut(&selector.name, context)?
            }
            PopulationKind::SynapseGroup => {
                self.synapse_populations.require_mut(&selector.name, context)?
            }
            PopulationKind::CurrentSource => {
                self.current_sources.require_mut(&selector.name, context)?
            }
            PopulationKind::CustomUpdate => {
                self.custom_updates.require_mut(&selector.name, context)?
            }
        };
        Ok(population)
    }

    fn selector_kind(&self, selector: &GroupSelector, context: &str) -> Result<PopulationKind> {
        if let Some((model_id, kind)) = selector.handle {
            if model_id != self.id {
                return Err(GennError::not_found("population", &selector.name, context));
            }
            return Ok(kind);
        }
        PopulationKind::ALL
            .into_iter()
            .find(|kind| match kind {
                PopulationKind::NeuronGroup => self.neuron_populations.contains(&selector.name),
                PopulationKind::SynapseGroup => self.synapse_populations.contains(&selector.name),
                PopulationKind::CurrentSource => self.current_sources.contains(&selector.name),
                PopulationKind::CustomUpdate => self.custom_updates.contains(&selector.name),
            })
            .ok_or_else(|| GennError::not_found("population", &selector.name, context))
    }

    fn handle(&self, kind: PopulationKind, name: &str) -> PopulationHandle {
        PopulationHandle {
            model_id: self.id,
            kind,
            name: name.to_string(),
        }
    }

    /// Add a neuron population
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
        self.ensure_unfrozen("add neuron population")?;
        let model = model.into_model()?;
        let params = resolve_params(model.base(), params, name)?;
        let inits = resolve_var_inits(&model.base().vars, vars, name)?;

        let mut core = PopulationCore::new(name, PopulationKind::NeuronGroup, self.id, params);
        add_var_states(
            &mut core,
            &model.base().vars,
            inits,
            VarRole::Neuron,
            num_neurons,
            self.precision,
        )?;
        add_model_egps(&mut core, &model.base().extra_global_params);

        self.neuron_populations.insert(NeuronGroup {
            core,
            model,
            num_neurons,
            spike_recording_enabled: false,
            spike_event_recording_enabled: false,
            spikes: Vec::new(),
            spike_events: Vec::new(),
            recorded_spikes: Vec::new(),
            recorded_spike_events: Vec::new(),
        })?;
        Ok(self.handle(PopulationKind::NeuronGroup, name))
    }

    /// Add a synapse population between two registered neuron populations
    pub fn add_synapse_population(&mut self, builder: SynapseGroupBuilder) -> Result<PopulationHandle> {
        self.ensure_unfrozen("add synapse population")?;
        let source = self.resolve_name(&builder.source, PopulationKind::NeuronGroup, "source")?;
        let target = self.resolve_name(&builder.target, PopulationKind::NeuronGroup, "target")?;
        let name = builder.name.as_str();
        if self.synapse_populations.contains(name) {
            return Err(GennError::AlreadyExists {
                kind: PopulationKind::SynapseGroup.to_string(),
                name: name.to_string(),
            });
        }

        let num_pre = self.neuron_populations.require(&source, "source")?.num_neurons();
        let num_post = self.neuron_populations.require(&target, "target")?.num_neurons();
        let matrix_type = builder.matrix_type;

        let wu_model = builder.wu_model.ok_or_else(|| {
            GennError::invalid_model(format!("Synapse population '{}' has no weight update model", name))
        })??;
        let ps_model = match builder.ps_model {
            Some(model) => model?,
            None => IntoModel::<PostsynapticModel>::into_model("DeltaCurr")?,
        };

        validate_connectivity(
            name,
            matrix_type,
            builder.connectivity_init.as_ref(),
            builder.toeplitz_init.as_ref(),
        )?;

        let max_row_length = match (&builder.connectivity_init, &builder.toeplitz_init) {
            (Some(init), _) => init.max_row_length(num_pre as u32, num_post as u32),
            (None, Some(init)) => init.max_row_length(num_pre as u32, num_post as u32),
            (None, None) => None,
        }
        .map(|len| len as usize)
        .unwrap_or(num_post);

        let wu_count = match matrix_type {
            MatrixType::DENSE_INDIVIDUALG => num_pre * num_post,
            MatrixType::SPARSE_INDIVIDUALG => num_pre * max_row_length,
            MatrixType::DENSE_GLOBALG | MatrixType::SPARSE_GLOBALG | MatrixType::BITMASK_GLOBALG => 1,
            MatrixType::PROCEDURAL_PROCEDURALG => 0,
            MatrixType::TOEPLITZ_KERNELG => {
                let kernel = builder
                    .toeplitz_init
                    .as_ref()
                    .and_then(|init| init.snippet.kernel_size(&init.params))
                    .ok_or_else(|| {
                        GennError::invalid_model(format!(
                            "Toeplitz connectivity of '{}' does not declare a kernel size",
                            name
                        ))
                    })?;
                kernel.iter().map(|&k| k as usize).product()
            }
        };

        let wu_params = resolve_params(wu_model.base(), builder.wu_params, name)?;
        let wu_inits = resolve_var_inits(&wu_model.base().vars, builder.wu_vars, name)?;
        let pre_inits = resolve_var_inits(&wu_model.pre_vars, builder.wu_pre_vars, name)?;
        let post_inits = resolve_var_inits(&wu_model.post_vars, builder.wu_post_vars, name)?;
        let ps_params = resolve_params(ps_model.base(), builder.ps_params, name)?;
        let ps_inits = resolve_var_inits(&ps_model.base().vars, builder.ps_vars, name)?;

        let mut core = PopulationCore::new(name, PopulationKind::SynapseGroup, self.id, wu_params);
        add_var_states(
            &mut core,
            &wu_model.base().vars,
            wu_inits,
            VarRole::WeightUpdate,
            wu_count,
            self.precision,
        )?;
        add_var_states(
            &mut core,
            &wu_model.pre_vars,
            pre_inits,
            VarRole::WeightUpdatePre,
            num_pre,
            self.precision,
        )?;
        add_var_states(
            &mut core,
            &wu_model.post_vars,
            post_inits,
            VarRole::WeightUpdatePost,
            num_post,
            self.precision,
        )?;
        add_var_states(
            &mut core,
            &ps_model.base().vars,
            ps_inits,
            VarRole::Postsynaptic,
            num_post,
            self.precision,
        )?;
        ensure_unique_var_names(&core)?;

        add_model_egps(&mut core, &wu_model.base().extra_global_params);
        add_model_egps(&mut core, &ps_model.base().extra_global_params);
        if let Some(init) = &builder.connectivity_init {
            for egp in &init.snippet.base().extra_global_params {
                core.extra_global_params
                    .push(ExtraGlobalParam::from_decl(egp, true));
            }
        }

        debug!(
            target: "genn_model",
            "Synapse population '{}': {} -> {} ({}, max row length {})",
            name, source, target, matrix_type, max_row_length
        );

        self.synapse_populations.insert(SynapseGroup {
            core,
            wu_model,
            ps_model,
            ps_params,
            ps_derived_params: Vec::new(),
            matrix_type,
            delay_steps: builder.delay_steps,
            source,
            target,
            num_pre,
            num_post,
            max_row_length,
            connectivity_init: builder.connectivity_init,
            toeplitz_init: builder.toeplitz_init,
            connectivity: None,
        })?;
        Ok(self.handle(PopulationKind::SynapseGroup, name))
    }

    /// Add a current source injecting into a registered neuron population
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
        self.ensure_unfrozen("add current source")?;
        let target = self.resolve_name(&pop.to_selector(), PopulationKind::NeuronGroup, "pop")?;
        let size = self.neuron_populations.require(&target, "pop")?.num_neurons();

        let model = model.into_model()?;
        let params = resolve_params(model.base(), params, name)?;
        let inits = resolve_var_inits(&model.base().vars, vars, name)?;

        let mut core = PopulationCore::new(name, PopulationKind::CurrentSource, self.id, params);
        add_var_states(
            &mut core,
            &model.base().vars,
            inits,
            VarRole::CurrentSource,
            size,
            self.precision,
        )?;
        add_model_egps(&mut core, &model.base().extra_global_params);

        self.current_sources.insert(CurrentSource {
            core,
            model,
            target,
            size,
        })?;
        Ok(self.handle(PopulationKind::CurrentSource, name))
    }

    /// Add a custom update executed as part of `update_group_name`
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
        self.ensure_unfrozen("add custom update")?;
        let model = model.into_model()?;

        let mut resolved: Vec<(String, VarReference)> = Vec::new();
        for (ref_name, var_ref) in var_refs {
            let ref_name = ref_name.as_ref();
            if model.var_ref(ref_name).is_none() {
                return Err(GennError::invalid_model(format!(
                    "'{}' has no variable reference named '{}'",
                    name, ref_name
                )));
            }
            self.validate_var_ref(&var_ref)?;
            resolved.push((ref_name.to_string(), var_ref));
        }
        // Declaration order, every declared reference supplied
        let mut var_refs = Vec::with_capacity(model.var_refs.len());
        for decl in &model.var_refs {
            let position = resolved.iter().position(|(n, _)| *n == decl.name).ok_or_else(|| {
                GennError::invalid_model(format!(
                    "Missing variable reference '{}' of '{}'",
                    decl.name, name
                ))
            })?;
            var_refs.push(resolved.swap_remove(position));
        }

        let size = match var_refs.first() {
            Some((_, first)) => first.count(),
            None => 0,
        };
        if let Some((ref_name, mismatch)) = var_refs.iter().find(|(_, r)| r.count() != size) {
            return Err(GennError::invalid_model(format!(
                "Variable reference '{}' of '{}' has {} elements, expected {}",
                ref_name,
                name,
                mismatch.count(),
                size
            )));
        }

        let params = resolve_params(model.base(), params, name)?;
        let inits = resolve_var_inits(&model.base().vars, vars, name)?;
        let mut core = PopulationCore::new(name, PopulationKind::CustomUpdate, self.id, params);
        add_var_states(
            &mut core,
            &model.base().vars,
            inits,
            VarRole::CustomUpdate,
            size,
            self.precision,
        )?;
        add_model_egps(&mut core, &model.base().extra_global_params);

        self.custom_updates.insert(CustomUpdate {
            core,
            model,
            update_group_name: update_group_name.to_string(),
            var_refs,
            size,
        })?;
        Ok(self.handle(PopulationKind::CustomUpdate, name))
    }

    fn validate_var_ref(&self, var_ref: &VarReference) -> Result<()> {
        if var_ref.model_id != self.id {
            return Err(GennError::not_found(
                var_ref.kind.as_str(),
                &var_ref.population,
                "var_ref",
            ));
        }
        let owner = self.population(
            PopulationHandle {
                model_id: self.id,
                kind: var_ref.kind,
                name: var_ref.population.clone(),
            },
            "var_ref",
        )?;
        if owner.var(&var_ref.var_name).is_none() {
            return Err(GennError::not_found("variable", &var_ref.var_name, "var_ref"));
        }
        if let VarRefTarget::WeightUpdate {
            transpose: Some((sg, var)),
        } = &var_ref.target
        {
            let transpose = self.synapse_populations.require(sg, "var_ref")?;
            if transpose.var(var).is_none() {
                return Err(GennError::not_found("variable", var, "var_ref"));
            }
        }
        Ok(())
    }

    /// Set where a variable is stored
    pub fn set_var_location(
        &mut self,
        group: impl GroupRef,
        var: &str,
        location: VarLocation,
    ) -> Result<()> {
        self.ensure_unfrozen("set variable location")?;
        let population = self.population_mut(group, "pop")?;
        let name = population.name().to_string();
        let state = population
            .var_mut(var)
            .ok_or_else(|| GennError::not_found("variable", var, name))?;
        state.location = location;
        Ok(())
    }

    pub fn set_spike_recording_enabled(&mut self, pop: impl GroupRef, enabled: bool) -> Result<()> {
        self.ensure_unfrozen("change spike recording")?;
        let name = self.resolve_name(&pop.to_selector(), PopulationKind::NeuronGroup, "pop")?;
        self.neuron_populations.require_mut(&name, "pop")?.spike_recording_enabled = enabled;
        Ok(())
    }

    pub fn set_spike_event_recording_enabled(
        &mut self,
        pop: impl GroupRef,
        enabled: bool,
    ) -> Result<()> {
        self.ensure_unfrozen("change spike event recording")?;
        let name = self.resolve_name(&pop.to_selector(), PopulationKind::NeuronGroup, "pop")?;
        self.neuron_populations
            .require_mut(&name, "pop")?
            .spike_event_recording_enabled = enabled;
        Ok(())
    }

    /// Freeze the structure and evaluate derived parameters
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_unfrozen("finalize")?;
        let dt = self.dt;

        for ng in self.neuron_populations.iter_mut() {
            ng.core.derived_params = ng.model.base().derived_values(&ng.core.params, dt);
        }
        for sg in self.synapse_populations.iter_mut() {
            sg.core.derived_params = sg.wu_model.base().derived_values(&sg.core.params, dt);
            sg.ps_derived_params = sg.ps_model.base().derived_values(&sg.ps_params, dt);
        }
        for cs in self.current_sources.iter_mut() {
            cs.core.derived_params = cs.model.base().derived_values(&cs.core.params, dt);
        }
        for cu in self.custom_updates.iter_mut() {
            cu.core.derived_params = cu.model.base().derived_values(&cu.core.params, dt);
        }

        self.finalized = true;
        info!(
            target: "genn_model",
            "Finalized model '{}': {} neuron, {} synapse, {} current source, {} custom update populations",
            self.name,
            self.neuron_populations.len(),
            self.synapse_populations.len(),
            self.current_sources.len(),
            self.custom_updates.len()
        );
        Ok(())
    }
}

fn add_var_states(
    core: &mut PopulationCore,
    decls: &[Var],
    inits: Vec<VarInit>,
    role: VarRole,
    count: usize,
    precision: Precision,
) -> Result<()> {
    for (decl, init) in decls.iter().zip(inits) {
        if type_size_bytes(&decl.type_name, precision).is_err() {
            return Err(GennError::invalid_model(format!(
                "Variable '{}' of '{}' has unknown type '{}'",
                decl.name, core.name, decl.type_name
            )));
        }
        if let VarInit::Values(values) = &init {
            if values.len() != count {
                return Err(GennError::invalid_model(format!(
                    "Variable '{}' of '{}' has {} initial values, expected {}",
                    decl.name,
                    core.name,
                    values.len(),
                    count
                )));
            }
        }
        core.add_init_egps(&decl.name, &init);
        core.vars.push(VarState::new(decl, role, init, count));
    }
    Ok(())
}

fn add_model_egps(core: &mut PopulationCore, egps: &[Egp]) {
    core.extra_global_params
        .extend(egps.iter().map(|egp| ExtraGlobalParam::from_decl(egp, false)));
}

fn ensure_unique_var_names(core: &PopulationCore) -> Result<()> {
    for (i, var) in core.vars.iter().enumerate() {
        if core.vars[..i].iter().any(|v| v.name == var.name) {
            return Err(GennError::invalid_model(format!(
                "Variable name '{}' is used twice in '{}'",
                var.name, core.name
            )));
        }
    }
    Ok(())
}

fn validate_connectivity(
    name: &str,
    matrix_type: MatrixType,
    connectivity: Option<&ConnectivityInit>,
    toeplitz: Option<&ToeplitzInit>,
) -> Result<()> {
    let problem = if matrix_type.is_dense() && (connectivity.is_some() || toeplitz.is_some()) {
        Some("dense connectivity takes no connectivity initialiser")
    } else if matrix_type.is_procedural() && connectivity.is_none() {
        Some("procedural connectivity requires a connectivity initialiser")
    } else if matrix_type.is_toeplitz() && (toeplitz.is_none() || connectivity.is_some()) {
        Some("Toeplitz connectivity requires a Toeplitz connectivity initialiser")
    } else if !matrix_type.is_toeplitz() && toeplitz.is_some() {
        Some("Toeplitz initialisers need TOEPLITZ_KERNELG connectivity")
    } else {
        None
    };

    match problem {
        Some(reason) => Err(GennError::invalid_model(format!(
            "Synapse population '{}' ({}): {}",
            name, matrix_type, reason
        ))),
        None => Ok(()),
    }
}

fn var_ref_to(
    population: &dyn Population,
    var_name: &str,
    role: Option<VarRole>,
    target: VarRefTarget,
) -> Result<VarReference> {
    let var = population
        .var(var_name)
        .filter(|v| role.map_or(true, |r| v.role == r))
        .ok_or_else(|| GennError::not_found("variable", var_name, population.name()))?;
    Ok(VarReference {
        model_id: population.model_id(),
        kind: population.kind(),
        population: population.name().to_string(),
        var_name: var_name.to_string(),
        type_name: var.type_name.clone(),
        target,
        count: var.count,
    })
}

/// Reference a neuron, current source or custom update variable
pub fn create_var_ref(population: &dyn Population, var_name: &str) -> Result<VarReference> {
    if population.kind() == PopulationKind::SynapseGroup {
        return Err(GennError::invalid_model(format!(
            "'{}' is a synapse group; use the synapse-specific reference constructors",
            population.name()
        )));
    }
    var_ref_to(population, var_name, None, VarRefTarget::Population)
}

/// Reference a postsynaptic model variable of a synapse group
pub fn create_psm_var_ref(sg: &SynapseGroup, var_name: &str) -> Result<VarReference> {
    var_ref_to(sg, var_name, Some(VarRole::Postsynaptic), VarRefTarget::Postsynaptic)
}

/// Reference a presynaptic weight-update variable
pub fn create_wu_pre_var_ref(sg: &SynapseGroup, var_name: &str) -> Result<VarReference> {
    var_ref_to(sg, var_name, Some(VarRole::WeightUpdatePre), VarRefTarget::WeightUpdatePre)
}

/// Reference a postsynaptic weight-update variable
pub fn create_wu_post_var_ref(sg: &SynapseGroup, var_name: &str) -> Result<VarReference> {
    var_ref_to(sg, var_name, Some(VarRole::WeightUpdatePost), VarRefTarget::WeightUpdatePost)
}

/// Reference a per-synapse weight-update variable, optionally with a transpose target
pub fn create_wu_var_ref(
    sg: &SynapseGroup,
    var_name: &str,
    transpose: Option<(&SynapseGroup, &str)>,
) -> Result<VarReference> {
    let transpose = match transpose {
        Some((tsg, tvar)) => {
            if tsg.num_pre() != sg.num_post() || tsg.num_post() != sg.num_pre() {
                return Err(GennError::invalid_model(format!(
                    "'{}' is not the transpose of '{}'",
                    tsg.name(),
                    sg.name()
                )));
            }
            tsg.vars_with_role(VarRole::WeightUpdate)
                .find(|v| v.name == tvar)
                .ok_or_else(|| GennError::not_found("variable", tvar, tsg.name()))?;
            Some((tsg.name().to_string(), tvar.to_string()))
        }
        None => None,
    };
    var_ref_to(
        sg,
        var_name,
        Some(VarRole::WeightUpdate),
        VarRefTarget::WeightUpdate { transpose },
    )
}
