// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Load ordering and teardown, observed through a recording mock backend

use genn_backend::*;
use genn_lifecycle::{GennModel, GennModelOptions};
use genn_model::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tracing::Level;

type CallLog = Arc<Mutex<Vec<String>>>;

struct MockFactory {
    log: CallLog,
    toolchain: ToolchainKind,
}

struct MockBackend {
    log: CallLog,
    preferences: Preferences,
    toolchain: ToolchainKind,
}

struct MockRuntime {
    log: CallLog,
    timestep: u64,
}

impl MockRuntime {
    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl BackendFactory for MockFactory {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_preferences(&self) -> Preferences {
        Preferences::new().with("debug_code", false)
    }

    fn create_backend(
        &self,
        _spec: &ModelSpec,
        _output_path: &Path,
        _log_level: Level,
        preferences: Preferences,
    ) -> Result<Box<dyn Backend>> {
        Ok(Box::new(MockBackend {
            log: Arc::clone(&self.log),
            preferences,
            toolchain: self.toolchain,
        }))
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    fn generate_code(
        &self,
        spec: &ModelSpec,
        _share_path: &Path,
        _output_path: &Path,
        _force_rebuild: bool,
    ) -> Result<MemAlloc> {
        self.log.lock().unwrap().push(format!("generate {}", spec.name()));
        Ok(MemAlloc::default())
    }

    fn toolchain(&self) -> ToolchainKind {
        self.toolchain
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        Ok(Box::new(MockRuntime {
            log: Arc::clone(&self.log),
            timestep: 0,
        }))
    }
}

impl Runtime for MockRuntime {
    fn open(&mut self, _path: &Path, model_name: &str) -> Result<()> {
        self.record(format!("open {}", model_name));
        Ok(())
    }

    fn allocate_mem(&mut self) -> Result<()> {
        self.record("allocate_mem".into());
        Ok(())
    }

    fn allocate_recording_buffers(&mut self, timesteps: u32) -> Result<()> {
        self.record(format!("allocate_recording_buffers {}", timesteps));
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.record("initialize".into());
        Ok(())
    }

    fn initialize_sparse(&mut self) -> Result<()> {
        self.record("initialize_sparse".into());
        Ok(())
    }

    fn step_time(&mut self) -> Result<()> {
        self.timestep += 1;
        Ok(())
    }

    fn custom_update(&mut self, group: &str) -> Result<()> {
        self.record(format!("custom_update {}", group));
        Ok(())
    }

    fn push_var(&mut self, _kind: PopulationKind, pop: &str, var: &str, _values: &[f64]) -> Result<()> {
        self.record(format!("push_var {}.{}", pop, var));
        Ok(())
    }

    fn pull_var(&mut self, _kind: PopulationKind, _pop: &str, _var: &str) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn push_spikes(&mut self, _pop: &str, _spikes: &[u32]) -> Result<()> {
        Ok(())
    }

    fn pull_spikes(&mut self, _pop: &str) -> Result<Vec<u32>> {
        Ok(Vec::new())
    }

    fn push_current_spikes(&mut self, _pop: &str, _spikes: &[u32]) -> Result<()> {
        Ok(())
    }

    fn pull_current_spikes(&mut self, _pop: &str) -> Result<Vec<u32>> {
        Ok(Vec::new())
    }

    fn push_spike_events(&mut self, _pop: &str, _events: &[u32]) -> Result<()> {
        Ok(())
    }

    fn push_current_spike_events(&mut self, _pop: &str, _events: &[u32]) -> Result<()> {
        Ok(())
    }

    fn push_connectivity(&mut self, pop: &str, _connectivity: &SparseConnectivity) -> Result<()> {
        self.record(format!("push_connectivity {}", pop));
        Ok(())
    }

    fn pull_connectivity(&mut self, _pop: &str) -> Result<SparseConnectivity> {
        Ok(SparseConnectivity::default())
    }

    fn allocate_extra_global_param(
        &mut self,
        _kind: PopulationKind,
        pop: &str,
        egp: &str,
        count: usize,
    ) -> Result<()> {
        self.record(format!("allocate_egp {}.{} {}", pop, egp, count));
        Ok(())
    }

    fn push_extra_global_param(
        &mut self,
        _kind: PopulationKind,
        pop: &str,
        egp: &str,
        values: &[f64],
    ) -> Result<()> {
        self.record(format!("push_egp {}.{} {}", pop, egp, values.len()));
        Ok(())
    }

    fn pull_extra_global_param(&mut self, _kind: PopulationKind, _pop: &str, _egp: &str) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn free_extra_global_param(&mut self, kind: PopulationKind, pop: &str, egp: &str) -> Result<()> {
        self.record(format!("free_egp {} {}.{}", kind, pop, egp));
        Ok(())
    }

    fn pull_recording_buffers(&mut self) -> Result<Vec<RecordedSpikes>> {
        Ok(Vec::new())
    }

    fn time(&self) -> f64 {
        self.timestep as f64 * DEFAULT_DT
    }

    fn set_time(&mut self, _t: f64) {}

    fn timestep(&self) -> u64 {
        self.timestep
    }

    fn set_timestep(&mut self, timestep: u64) {
        self.timestep = timestep;
    }

    fn timings(&self) -> Timings {
        Timings::default()
    }

    fn custom_update_time(&self, _group: &str) -> Option<f64> {
        None
    }

    fn custom_update_transpose_time(&self, _group: &str) -> Option<f64> {
        None
    }
}

fn mock_model(name: &str, toolchain: ToolchainKind) -> (GennModel, CallLog) {
    let log: CallLog = Arc::default();
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(MockFactory {
        log: Arc::clone(&log),
        toolchain,
    }));
    let model =
        GennModel::with_registry("float", name, GennModelOptions::default(), &registry).unwrap();
    (model, log)
}

/// A population of every kind, each carrying a runtime-allocated parameter
fn populate(model: &mut GennModel) {
    model
        .add_neuron_population(
            "Input",
            2,
            "SpikeSourceArray",
            NO_PARAMS,
            [("startSpike", vec![0.0, 1.0]), ("endSpike", vec![1.0, 2.0])],
        )
        .unwrap();
    model
        .set_extra_global_param("Input", "spikeTimes", vec![0.5, 1.5])
        .unwrap();

    model
        .add_synapse_population(
            SynapseGroupBuilder::new("Syn", MatrixType::SPARSE_INDIVIDUALG, "Input", "Input")
                .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)])
                .connectivity(init_connectivity("FixedProbability", [("prob", 0.5)]).unwrap()),
        )
        .unwrap();

    let pulse = CurrentSourceModel::custom("Pulse")
        .param_names(&["amp"])
        .extra_global_params(&[("times", "scalar*"), ("scale", "scalar")])
        .injection_code("$(injectCurrent, $(amp) * $(scale));");
    model
        .add_current_source("Stim", pulse, "Input", [("amp", 1.0)], NO_VARS)
        .unwrap();

    let scale = CustomUpdateModel::custom("Scale")
        .var_refs(&[("g", "scalar")])
        .extra_global_params(&[("factors", "scalar*")])
        .update_code("$(g) *= $(factors)[0];");
    let g_ref = create_wu_var_ref(model.spec().synapse_population("Syn").unwrap(), "g", None).unwrap();
    model
        .add_custom_update("ScaleG", "Plasticity", scale, NO_PARAMS, NO_VARS, [("g", g_ref)])
        .unwrap();
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn test_load_follows_fixed_order() {
    let dir = tempdir().unwrap();
    let (mut model, log) = mock_model("ordered", ToolchainKind::InProcess);
    populate(&mut model);
    model.build(dir.path(), false).unwrap();
    model.load(None).unwrap();

    let calls = calls(&log);
    let position = |call: &str| {
        calls
            .iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("'{}' not called: {:?}", call, calls))
    };

    assert_eq!(calls[0], "generate ordered");
    assert!(position("open ordered") < position("allocate_mem"));
    assert!(position("allocate_mem") < position("initialize"));
    assert!(position("initialize") < position("allocate_egp Input.spikeTimes 2"));
    assert!(position("push_egp Input.spikeTimes 2") < position("initialize_sparse"));
    assert!(!calls.iter().any(|c| c.starts_with("allocate_recording_buffers")));
    assert_eq!(calls.last().map(String::as_str), Some("initialize_sparse"));
}

#[test]
fn test_recording_buffers_allocated_before_initialisation() {
    let dir = tempdir().unwrap();
    let (mut model, log) = mock_model("recorded", ToolchainKind::InProcess);
    populate(&mut model);
    model.set_spike_recording_enabled("Input", true).unwrap();
    model.build(dir.path(), false).unwrap();
    model.load(Some(250)).unwrap();

    let calls = calls(&log);
    let alloc = calls
        .iter()
        .position(|c| c == "allocate_recording_buffers 250")
        .unwrap();
    let init = calls.iter().position(|c| c == "initialize").unwrap();
    assert!(alloc < init);
}

#[test]
fn test_explicit_connectivity_pushed_on_load() {
    let dir = tempdir().unwrap();
    let (mut model, log) = mock_model("explicit", ToolchainKind::InProcess);
    model
        .add_neuron_population("Pop", 3, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();
    model
        .add_synapse_population(
            SynapseGroupBuilder::new("Syn", MatrixType::SPARSE_INDIVIDUALG, "Pop", "Pop")
                .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)]),
        )
        .unwrap();
    model
        .spec_mut()
        .synapse_population_mut("Syn")
        .unwrap()
        .set_sparse_connections(&[0, 1], &[1, 2])
        .unwrap();
    model.build(dir.path(), false).unwrap();
    model.load(None).unwrap();

    let calls = calls(&log);
    let push = calls.iter().position(|c| c == "push_connectivity Syn").unwrap();
    let sparse = calls.iter().position(|c| c == "initialize_sparse").unwrap();
    assert!(push < sparse);
}

#[test]
fn test_end_frees_runtime_allocated_params_of_every_kind() {
    let dir = tempdir().unwrap();
    let (mut model, log) = mock_model("teardown", ToolchainKind::InProcess);
    populate(&mut model);
    model.build(dir.path(), false).unwrap();
    model.load(None).unwrap();
    log.lock().unwrap().clear();

    model.end().unwrap();

    let frees: Vec<String> = calls(&log)
        .into_iter()
        .filter(|c| c.starts_with("free_egp"))
        .collect();
    assert_eq!(
        frees,
        vec![
            "free_egp neuron group Input.spikeTimes".to_string(),
            "free_egp current source Stim.times".to_string(),
            "free_egp custom update ScaleG.factors".to_string(),
        ]
    );
}

#[test]
fn test_end_before_load_touches_nothing() {
    let dir = tempdir().unwrap();
    let (mut model, log) = mock_model("unloaded_end", ToolchainKind::InProcess);
    populate(&mut model);
    model.build(dir.path(), false).unwrap();
    log.lock().unwrap().clear();

    model.end().unwrap();
    assert!(calls(&log).is_empty());
}

#[test]
fn test_host_toolchain_failure_is_external_tool_error() {
    let dir = tempdir().unwrap();
    let (mut model, _log) = mock_model("host_build", ToolchainKind::Host);
    model
        .add_neuron_population("Pop", 3, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();

    // No generated makefile exists, so the host build step fails
    let err = model.build(dir.path(), false).unwrap_err();
    assert!(matches!(err, GennError::ExternalTool { .. }));
    assert!(!model.is_built());
    assert!(model.build(dir.path(), false).unwrap_err().is_state_error());
}

#[test]
fn test_mock_backend_selected_from_registry() {
    let (mut model, _log) = mock_model("stepping", ToolchainKind::InProcess);
    assert_eq!(model.backend_name(), "mock");
    model
        .add_neuron_population("Pop", 3, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();

    let dir = tempdir().unwrap();
    model.build(dir.path(), false).unwrap();
    model.load(None).unwrap();
    for _ in 0..5 {
        model.step_time().unwrap();
    }
    assert_eq!(model.timestep().unwrap(), 5);
}
