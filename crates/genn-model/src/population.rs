// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Populations
//!
//! Named, homogeneous collections of simulated units sharing one model kind.
//! Each population is exclusively owned by its registry inside a
//! [`ModelSpec`](crate::ModelSpec); the `model_id` it carries is a non-owning
//! back-reference that is only meaningful while that spec is alive.

use crate::error::{GennError, Result};
use crate::init::{ConnectivityInit, ToeplitzInit, VarInit};
use crate::models::{
    CurrentSourceModel, CustomUpdateModel, Egp, NeuronModel, PostsynapticModel, Var,
    WeightUpdateModel,
};
use crate::types::{MatrixType, VarLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one model description instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    pub(crate) fn next() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The four population kinds, each with its own registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PopulationKind {
    NeuronGroup,
    SynapseGroup,
    CurrentSource,
    CustomUpdate,
}

impl PopulationKind {
    /// Fixed order used for initialisation, loading and teardown
    pub const ALL: [PopulationKind; 4] = [
        PopulationKind::NeuronGroup,
        PopulationKind::SynapseGroup,
        PopulationKind::CurrentSource,
        PopulationKind::CustomUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PopulationKind::NeuronGroup => "neuron group",
            PopulationKind::SynapseGroup => "synapse group",
            PopulationKind::CurrentSource => "current source",
            PopulationKind::CustomUpdate => "custom update",
        }
    }
}

impl fmt::Display for PopulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned on registration, usable wherever a population name is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulationHandle {
    pub(crate) model_id: ModelId,
    pub(crate) kind: PopulationKind,
    pub(crate) name: String,
}

impl PopulationHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PopulationKind {
        self.kind
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }
}

impl fmt::Display for PopulationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// A population given either by name or by handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelector {
    pub name: String,
    pub handle: Option<(ModelId, PopulationKind)>,
}

/// Anything that can identify a population
pub trait GroupRef {
    fn to_selector(&self) -> GroupSelector;
}

impl GroupRef for &str {
    fn to_selector(&self) -> GroupSelector {
        GroupSelector {
            name: self.to_string(),
            handle: None,
        }
    }
}

impl GroupRef for String {
    fn to_selector(&self) -> GroupSelector {
        self.as_str().to_selector()
    }
}

impl GroupRef for &String {
    fn to_selector(&self) -> GroupSelector {
        self.as_str().to_selector()
    }
}

impl GroupRef for PopulationHandle {
    fn to_selector(&self) -> GroupSelector {
        GroupSelector {
            name: self.name.clone(),
            handle: Some((self.model_id, self.kind)),
        }
    }
}

impl GroupRef for &PopulationHandle {
    fn to_selector(&self) -> GroupSelector {
        (*self).to_selector()
    }
}

/// Which of a population's variable sets a variable belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarRole {
    Neuron,
    WeightUpdate,
    WeightUpdatePre,
    WeightUpdatePost,
    Postsynaptic,
    CurrentSource,
    CustomUpdate,
}

/// A declared variable with its initialiser, placement and host-side view
#[derive(Debug, Clone)]
pub struct VarState {
    pub name: String,
    pub type_name: String,
    pub role: VarRole,
    pub init: VarInit,
    pub location: VarLocation,
    /// Number of elements the variable holds
    pub count: usize,
    /// Host copy, filled on load and by pulls
    pub values: Vec<f64>,
}

impl VarState {
    pub(crate) fn new(decl: &Var, role: VarRole, init: VarInit, count: usize) -> Self {
        Self {
            name: decl.name.clone(),
            type_name: decl.type_name.clone(),
            role,
            init,
            location: VarLocation::default(),
            count,
            values: Vec::new(),
        }
    }
}

/// Array-valued parameter shared by every unit of a population
#[derive(Debug, Clone)]
pub struct ExtraGlobalParam {
    pub name: String,
    pub type_name: String,
    /// Runtime allocates (and must free) this parameter's storage
    pub needs_allocation: bool,
    /// Required by a variable or connectivity initialiser
    pub used_in_init: bool,
    pub values: Vec<f64>,
}

impl ExtraGlobalParam {
    pub(crate) fn from_decl(decl: &Egp, used_in_init: bool) -> Self {
        Self {
            name: decl.name.clone(),
            type_name: decl.type_name.clone(),
            needs_allocation: decl.type_name.trim_end().ends_with('*'),
            used_in_init,
            values: Vec::new(),
        }
    }

    pub fn element_type(&self) -> &str {
        self.type_name.trim_end_matches('*').trim()
    }
}

/// State shared by every population kind
#[derive(Debug, Clone)]
pub struct PopulationCore {
    pub(crate) name: String,
    pub(crate) kind: PopulationKind,
    pub(crate) model_id: ModelId,
    pub(crate) params: Vec<f64>,
    pub(crate) derived_params: Vec<(String, f64)>,
    pub(crate) vars: Vec<VarState>,
    pub(crate) extra_global_params: Vec<ExtraGlobalParam>,
}

impl PopulationCore {
    pub(crate) fn new(name: &str, kind: PopulationKind, model_id: ModelId, params: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            model_id,
            params,
            derived_params: Vec::new(),
            vars: Vec::new(),
            extra_global_params: Vec::new(),
        }
    }

    /// Add the extra global parameters a variable initialiser needs, suffixed by variable name
    pub(crate) fn add_init_egps(&mut self, var_name: &str, init: &VarInit) {
        if let VarInit::Snippet { snippet, .. } = init {
            for egp in &snippet.base().extra_global_params {
                let decl = Egp::new(format!("{}{}", egp.name, var_name), egp.type_name.clone());
                self.extra_global_params
                    .push(ExtraGlobalParam::from_decl(&decl, true));
            }
        }
    }
}

/// Common read/write surface of every population kind
pub trait Population {
    fn core(&self) -> &PopulationCore;
    fn core_mut(&mut self) -> &mut PopulationCore;

    /// Number of units (neurons, or synapse rows for synapse groups)
    fn size(&self) -> usize;

    /// Name of the model kind this population runs
    fn model_name(&self) -> &str;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn kind(&self) -> PopulationKind {
        self.core().kind
    }

    fn model_id(&self) -> ModelId {
        self.core().model_id
    }

    fn params(&self) -> &[f64] {
        &self.core().params
    }

    fn derived_params(&self) -> &[(String, f64)] {
        &self.core().derived_params
    }

    fn vars(&self) -> &[VarState] {
        &self.core().vars
    }

    fn var(&self, name: &str) -> Option<&VarState> {
        self.core().vars.iter().find(|v| v.name == name)
    }

    fn var_mut(&mut self, name: &str) -> Option<&mut VarState> {
        self.core_mut().vars.iter_mut().find(|v| v.name == name)
    }

    fn extra_global_params(&self) -> &[ExtraGlobalParam] {
        &self.core().extra_global_params
    }

    fn extra_global_param(&self, name: &str) -> Option<&ExtraGlobalParam> {
        self.core()
            .extra_global_params
            .iter()
            .find(|e| e.name == name)
    }

    fn extra_global_param_mut(&mut self, name: &str) -> Option<&mut ExtraGlobalParam> {
        self.core_mut()
            .extra_global_params
            .iter_mut()
            .find(|e| e.name == name)
    }

    /// Host-side values of one variable
    fn var_values(&self, name: &str) -> Option<&[f64]> {
        self.var(name).map(|v| v.values.as_slice())
    }

    /// Replace the host-side values of one variable; returns false if it does not exist
    fn set_var_values(&mut self, name: &str, values: Vec<f64>) -> bool {
        match self.var_mut(name) {
            Some(var) => {
                var.values = values;
                true
            }
            None => false,
        }
    }

    /// Replace the host-side values of one extra global parameter; returns false if it does not exist
    fn set_extra_global_param(&mut self, name: &str, values: Vec<f64>) -> bool {
        match self.extra_global_param_mut(name) {
            Some(egp) => {
                egp.values = values;
                true
            }
            None => false,
        }
    }
}

/// Neuron population
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    pub(crate) core: PopulationCore,
    pub(crate) model: Arc<NeuronModel>,
    pub(crate) num_neurons: usize,
    pub(crate) spike_recording_enabled: bool,
    pub(crate) spike_event_recording_enabled: bool,
    /// Host copy of the spikes emitted in the current timestep
    pub spikes: Vec<u32>,
    /// Host copy of the spike-like events of the current timestep
    pub spike_events: Vec<u32>,
    /// Recorded spikes as `(time, neuron index)`, filled by recording-buffer pulls
    pub recorded_spikes: Vec<(f64, u32)>,
    pub recorded_spike_events: Vec<(f64, u32)>,
}

impl NeuronGroup {
    pub fn model(&self) -> &Arc<NeuronModel> {
        &self.model
    }

    pub fn num_neurons(&self) -> usize {
        self.num_neurons
    }

    pub fn spike_recording_enabled(&self) -> bool {
        self.spike_recording_enabled
    }

    pub fn spike_event_recording_enabled(&self) -> bool {
        self.spike_event_recording_enabled
    }

    pub fn recording_in_use(&self) -> bool {
        self.spike_recording_enabled || self.spike_event_recording_enabled
    }
}

impl Population for NeuronGroup {
    fn core(&self) -> &PopulationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    fn size(&self) -> usize {
        self.num_neurons
    }

    fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Explicit sparse connectivity as ragged rows of postsynaptic indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseConnectivity {
    pub rows: Vec<Vec<u32>>,
}

impl SparseConnectivity {
    /// Build rows from parallel pre/post index lists
    pub fn from_pairs(num_pre: usize, pre: &[u32], post: &[u32]) -> Option<Self> {
        if pre.len() != post.len() {
            return None;
        }
        let mut rows = vec![Vec::new(); num_pre];
        for (&i, &j) in pre.iter().zip(post) {
            rows.get_mut(i as usize)?.push(j);
        }
        Some(Self { rows })
    }

    pub fn num_synapses(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn max_row_length(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Flatten back into parallel pre/post index lists
    pub fn to_pairs(&self) -> (Vec<u32>, Vec<u32>) {
        let mut pre = Vec::with_capacity(self.num_synapses());
        let mut post = Vec::with_capacity(self.num_synapses());
        for (i, row) in self.rows.iter().enumerate() {
            for &j in row {
                pre.push(i as u32);
                post.push(j);
            }
        }
        (pre, post)
    }
}

/// Synapse projection between two neuron populations
#[derive(Debug, Clone)]
pub struct SynapseGroup {
    pub(crate) core: PopulationCore,
    pub(crate) wu_model: Arc<WeightUpdateModel>,
    pub(crate) ps_model: Arc<PostsynapticModel>,
    pub(crate) ps_params: Vec<f64>,
    pub(crate) ps_derived_params: Vec<(String, f64)>,
    pub(crate) matrix_type: MatrixType,
    pub(crate) delay_steps: u32,
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) num_pre: usize,
    pub(crate) num_post: usize,
    pub(crate) max_row_length: usize,
    pub(crate) connectivity_init: Option<ConnectivityInit>,
    pub(crate) toeplitz_init: Option<ToeplitzInit>,
    /// Host copy of the connectivity, set explicitly or filled by pulls
    pub connectivity: Option<SparseConnectivity>,
}

impl SynapseGroup {
    pub fn wu_model(&self) -> &Arc<WeightUpdateModel> {
        &self.wu_model
    }

    pub fn ps_model(&self) -> &Arc<PostsynapticModel> {
        &self.ps_model
    }

    pub fn ps_params(&self) -> &[f64] {
        &self.ps_params
    }

    pub fn ps_derived_params(&self) -> &[(String, f64)] {
        &self.ps_derived_params
    }

    pub fn matrix_type(&self) -> MatrixType {
        self.matrix_type
    }

    pub fn delay_steps(&self) -> u32 {
        self.delay_steps
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn num_pre(&self) -> usize {
        self.num_pre
    }

    pub fn num_post(&self) -> usize {
        self.num_post
    }

    pub fn max_row_length(&self) -> usize {
        self.max_row_length
    }

    pub fn connectivity_init(&self) -> Option<&ConnectivityInit> {
        self.connectivity_init.as_ref()
    }

    pub fn toeplitz_init(&self) -> Option<&ToeplitzInit> {
        self.toeplitz_init.as_ref()
    }

    /// Set explicit connectivity from parallel pre/post index lists.
    ///
    /// Only sparse projections carry explicit connectivity; rows may not
    /// exceed the group's maximum row length.
    pub fn set_sparse_connections(&mut self, pre: &[u32], post: &[u32]) -> Result<()> {
        if !self.matrix_type.is_sparse() {
            return Err(GennError::invalid_model(format!(
                "Synapse population '{}' is {}; explicit connections need sparse connectivity",
                self.core.name, self.matrix_type
            )));
        }
        if post.iter().any(|&j| j as usize >= self.num_post) {
            return Err(GennError::invalid_model(format!(
                "Postsynaptic index out of range for '{}' ({} neurons)",
                self.core.name, self.num_post
            )));
        }
        let conn = SparseConnectivity::from_pairs(self.num_pre, pre, post).ok_or_else(|| {
            GennError::invalid_model(format!(
                "Invalid connection lists for '{}': lengths {} and {}, {} presynaptic neurons",
                self.core.name,
                pre.len(),
                post.len(),
                self.num_pre
            ))
        })?;
        if conn.max_row_length() > self.max_row_length {
            return Err(GennError::invalid_model(format!(
                "Row of length {} exceeds maximum row length {} of '{}'",
                conn.max_row_length(),
                self.max_row_length,
                self.core.name
            )));
        }
        self.connectivity = Some(conn);
        Ok(())
    }

    /// Variables of one role (weight update, pre, post or postsynaptic)
    pub fn vars_with_role(&self, role: VarRole) -> impl Iterator<Item = &VarState> {
        self.core.vars.iter().filter(move |v| v.role == role)
    }
}

impl Population for SynapseGroup {
    fn core(&self) -> &PopulationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    fn size(&self) -> usize {
        self.num_pre
    }

    fn model_name(&self) -> &str {
        self.wu_model.name()
    }
}

/// Current injected into a neuron population
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub(crate) core: PopulationCore,
    pub(crate) model: Arc<CurrentSourceModel>,
    pub(crate) target: String,
    pub(crate) size: usize,
}

impl CurrentSource {
    pub fn model(&self) -> &Arc<CurrentSourceModel> {
        &self.model
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Population for CurrentSource {
    fn core(&self) -> &PopulationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    fn size(&self) -> usize {
        self.size
    }

    fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// What a variable reference points into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRefTarget {
    /// Neuron or current source state variable
    Population,
    /// Postsynaptic model variable of a synapse group
    Postsynaptic,
    WeightUpdatePre,
    WeightUpdatePost,
    /// Per-synapse weight-update variable, optionally with a transpose target
    WeightUpdate {
        transpose: Option<(String, String)>,
    },
}

/// Non-owning reference from a custom update into a variable of another population.
///
/// Holds the owner's kind and name rather than a pointer; it stays valid only
/// while the referenced population is registered in the same model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarReference {
    pub(crate) model_id: ModelId,
    pub(crate) kind: PopulationKind,
    pub(crate) population: String,
    pub(crate) var_name: String,
    pub(crate) type_name: String,
    pub(crate) target: VarRefTarget,
    pub(crate) count: usize,
}

impl VarReference {
    pub fn kind(&self) -> PopulationKind {
        self.kind
    }

    pub fn population(&self) -> &str {
        &self.population
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn target(&self) -> &VarRefTarget {
        &self.target
    }

    /// Number of elements in the referenced variable
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Per-timestep computation run as part of a named update group
#[derive(Debug, Clone)]
pub struct CustomUpdate {
    pub(crate) core: PopulationCore,
    pub(crate) model: Arc<CustomUpdateModel>,
    pub(crate) update_group_name: String,
    pub(crate) var_refs: Vec<(String, VarReference)>,
    pub(crate) size: usize,
}

impl CustomUpdate {
    pub fn model(&self) -> &Arc<CustomUpdateModel> {
        &self.model
    }

    pub fn update_group_name(&self) -> &str {
        &self.update_group_name
    }

    pub fn var_refs(&self) -> &[(String, VarReference)] {
        &self.var_refs
    }

    pub fn var_ref(&self, name: &str) -> Option<&VarReference> {
        self.var_refs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    /// Any reference carries a transpose target
    pub fn is_transpose(&self) -> bool {
        self.var_refs.iter().any(|(_, r)| {
            matches!(
                r.target,
                VarRefTarget::WeightUpdate {
                    transpose: Some(_)
                }
            )
        })
    }
}

impl Population for CustomUpdate {
    fn core(&self) -> &PopulationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    fn size(&self) -> usize {
        self.size
    }

    fn model_name(&self) -> &str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_connectivity_pairs_roundtrip_rows() {
        let conn = SparseConnectivity::from_pairs(3, &[0, 0, 2], &[1, 2, 0]).unwrap();
        assert_eq!(conn.rows, vec![vec![1, 2], vec![], vec![0]]);
        assert_eq!(conn.num_synapses(), 3);
        assert_eq!(conn.max_row_length(), 2);
        assert_eq!(conn.to_pairs(), (vec![0, 0, 2], vec![1, 2, 0]));
    }

    #[test]
    fn test_sparse_connectivity_rejects_bad_input() {
        assert!(SparseConnectivity::from_pairs(2, &[0, 1], &[0]).is_none());
        assert!(SparseConnectivity::from_pairs(2, &[5], &[0]).is_none());
    }

    #[test]
    fn test_pointer_egp_needs_allocation() {
        let egp = ExtraGlobalParam::from_decl(&Egp::new("spikeTimes", "scalar*"), false);
        assert!(egp.needs_allocation);
        assert_eq!(egp.element_type(), "scalar");

        let scalar = ExtraGlobalParam::from_decl(&Egp::new("rate", "scalar"), false);
        assert!(!scalar.needs_allocation);
    }

    #[test]
    fn test_model_ids_are_unique() {
        assert_ne!(ModelId::next(), ModelId::next());
    }
}
