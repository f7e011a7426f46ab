// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use genn_backend::single_threaded_cpu::code_directory;
use genn_backend::*;
use genn_model::*;
use std::fs;
use tempfile::tempdir;
use tracing::Level;

fn finalized_spec(recording: bool) -> ModelSpec {
    let mut spec = ModelSpec::new("ref_model", Precision::Float);
    spec.set_seed(1234).unwrap();
    spec.add_neuron_population(
        "Pop",
        10,
        "Izhikevich",
        [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
        [
            ("V", init_var("Uniform", [("min", -70.0), ("max", -60.0)]).unwrap()),
            ("U", VarInit::Constant(-13.0)),
        ],
    )
    .unwrap();
    spec.add_synapse_population(
        SynapseGroupBuilder::new("Self", MatrixType::SPARSE_INDIVIDUALG, "Pop", "Pop")
            .weight_update("StaticPulse", NO_PARAMS, [("g", 0.5)])
            .connectivity(init_connectivity("OneToOne", NO_PARAMS).unwrap()),
    )
    .unwrap();
    spec.set_spike_recording_enabled("Pop", recording).unwrap();
    spec.finalize().unwrap();
    spec
}

fn backend(spec: &ModelSpec, dir: &std::path::Path) -> Box<dyn Backend> {
    let factory = SingleThreadedCpuFactory;
    factory
        .create_backend(spec, dir, Level::WARN, factory.default_preferences())
        .unwrap()
}

#[test]
fn test_generate_writes_snapshot() {
    let dir = tempdir().unwrap();
    let spec = finalized_spec(false);
    let backend = backend(&spec, dir.path());

    let mem = backend
        .generate_code(&spec, dir.path(), dir.path(), false)
        .unwrap();
    assert!(mem.device_bytes > 0);
    assert_eq!(backend.toolchain(), ToolchainKind::InProcess);

    let artifact = code_directory(dir.path(), "ref_model").join("model.json");
    let snapshot = ModelSnapshot::read(&artifact).unwrap();
    assert_eq!(snapshot.neuron_groups.len(), 1);
    assert_eq!(snapshot.synapse_groups[0].max_row_length, 1);
}

#[test]
fn test_unfinalized_model_rejected() {
    let dir = tempdir().unwrap();
    let spec = ModelSpec::new("raw", Precision::Float);
    let backend = backend(&spec, dir.path());
    let err = backend
        .generate_code(&spec, dir.path(), dir.path(), false)
        .unwrap_err();
    assert!(err.is_state_error());
}

#[test]
fn test_unchanged_artifact_not_rewritten_without_force() {
    let dir = tempdir().unwrap();
    let spec = finalized_spec(false);
    let backend = backend(&spec, dir.path());
    let artifact = code_directory(dir.path(), "ref_model").join("model.json");

    backend.generate_code(&spec, dir.path(), dir.path(), false).unwrap();
    // Mark the file so a rewrite is detectable
    let marker = fs::read_to_string(&artifact).unwrap() + " ";
    fs::write(&artifact, &marker).unwrap();

    backend.generate_code(&spec, dir.path(), dir.path(), false).unwrap();
    assert_ne!(fs::read_to_string(&artifact).unwrap(), marker);

    let current = fs::read_to_string(&artifact).unwrap();
    backend.generate_code(&spec, dir.path(), dir.path(), false).unwrap();
    assert_eq!(fs::read_to_string(&artifact).unwrap(), current);

    backend.generate_code(&spec, dir.path(), dir.path(), true).unwrap();
    assert_eq!(fs::read_to_string(&artifact).unwrap(), current);
}

#[test]
fn test_runtime_initialises_and_steps() {
    let dir = tempdir().unwrap();
    let spec = finalized_spec(true);
    let backend = backend(&spec, dir.path());
    backend.generate_code(&spec, dir.path(), dir.path(), false).unwrap();

    let mut runtime = backend.create_runtime().unwrap();
    runtime.open(dir.path(), "ref_model").unwrap();
    runtime.allocate_mem().unwrap();
    runtime.allocate_recording_buffers(5).unwrap();
    runtime.initialize().unwrap();
    runtime.initialize_sparse().unwrap();

    let v = runtime.pull_var(PopulationKind::NeuronGroup, "Pop", "V").unwrap();
    assert_eq!(v.len(), 10);
    assert!(v.iter().all(|x| (-70.0..-60.0).contains(x)));
    let u = runtime.pull_var(PopulationKind::NeuronGroup, "Pop", "U").unwrap();
    assert!(u.iter().all(|x| *x == -13.0));

    let conn = runtime.pull_connectivity("Self").unwrap();
    assert_eq!(conn.num_synapses(), 10);

    runtime.push_current_spikes("Pop", &[2, 7]).unwrap();
    for _ in 0..3 {
        runtime.step_time().unwrap();
    }
    assert_eq!(runtime.timestep(), 3);
    assert!((runtime.time() - 0.3).abs() < 1e-9);

    let recorded = runtime.pull_recording_buffers().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].spikes, vec![(0.0, 2), (0.0, 7)]);
}

#[test]
fn test_runtime_extra_global_params() {
    let dir = tempdir().unwrap();
    let mut spec = ModelSpec::new("egp_model", Precision::Double);
    spec.add_neuron_population(
        "Input",
        2,
        "SpikeSourceArray",
        NO_PARAMS,
        [("startSpike", vec![0.0, 1.0]), ("endSpike", vec![1.0, 2.0])],
    )
    .unwrap();
    spec.finalize().unwrap();

    let backend = backend(&spec, dir.path());
    backend.generate_code(&spec, dir.path(), dir.path(), false).unwrap();
    let mut runtime = backend.create_runtime().unwrap();
    runtime.open(dir.path(), "egp_model").unwrap();
    runtime.allocate_mem().unwrap();

    let free_before = runtime.free_device_mem_bytes().unwrap();
    let kind = PopulationKind::NeuronGroup;
    assert!(runtime
        .push_extra_global_param(kind, "Input", "spikeTimes", &[1.0])
        .is_err());

    runtime.allocate_extra_global_param(kind, "Input", "spikeTimes", 2).unwrap();
    runtime
        .push_extra_global_param(kind, "Input", "spikeTimes", &[1.0, 5.0])
        .unwrap();
    assert_eq!(
        runtime.pull_extra_global_param(kind, "Input", "spikeTimes").unwrap(),
        vec![1.0, 5.0]
    );
    assert_eq!(runtime.free_device_mem_bytes().unwrap(), free_before - 16);

    runtime.free_extra_global_param(kind, "Input", "spikeTimes").unwrap();
    assert_eq!(runtime.free_device_mem_bytes().unwrap(), free_before);
}

#[test]
fn test_open_missing_artifact_fails() {
    let dir = tempdir().unwrap();
    let mut runtime = CpuRuntime::new(1024);
    let err = runtime.open(dir.path(), "missing").unwrap_err();
    assert!(matches!(err, GennError::Runtime(_)));
}

fn opened_runtime(timing: bool, dir: &std::path::Path) -> CpuRuntime {
    let mut spec = ModelSpec::new("timed", Precision::Float);
    spec.add_neuron_population(
        "Pop",
        4,
        "Izhikevich",
        [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
        [("V", -65.0), ("U", -13.0)],
    )
    .unwrap();
    let reset = CustomUpdateModel::custom("ResetV")
        .var_refs(&[("V", "scalar")])
        .update_code("$(V) = -65.0;");
    let v_ref = create_var_ref(spec.neuron_population("Pop").unwrap(), "V").unwrap();
    spec.add_custom_update("Reset", "Reset", reset, NO_PARAMS, NO_VARS, [("V", v_ref)])
        .unwrap();
    spec.set_timing(timing).unwrap();
    spec.finalize().unwrap();

    backend(&spec, dir)
        .generate_code(&spec, dir, dir, false)
        .unwrap();
    let mut runtime = CpuRuntime::new(1 << 20);
    runtime.open(dir, "timed").unwrap();
    runtime.allocate_mem().unwrap();
    runtime.initialize().unwrap();
    runtime.initialize_sparse().unwrap();
    runtime
}

#[test]
fn test_runtime_timers_follow_timing_flag() {
    let dir = tempdir().unwrap();
    let mut runtime = opened_runtime(false, dir.path());
    assert_eq!(
        runtime.artifact(),
        Some(code_directory(dir.path(), "timed").join("model.json").as_path())
    );

    for _ in 0..100 {
        runtime.step_time().unwrap();
    }
    runtime.custom_update("Reset").unwrap();

    assert_eq!(runtime.timings(), Timings::default());
    assert_eq!(runtime.custom_update_time("Reset"), None);
    assert_eq!(runtime.custom_update_count("Reset"), 1);
}

#[test]
fn test_runtime_timers_accumulate_with_timing() {
    let dir = tempdir().unwrap();
    let mut runtime = opened_runtime(true, dir.path());
    for _ in 0..100 {
        runtime.step_time().unwrap();
    }
    runtime.custom_update("Reset").unwrap();
    runtime.custom_update("Reset").unwrap();

    assert!(runtime.timings().neuron_update > 0.0);
    assert!(runtime.custom_update_time("Reset").is_some());
    assert_eq!(runtime.custom_update_transpose_time("Reset"), None);
    assert_eq!(runtime.custom_update_count("Reset"), 2);
    assert_eq!(runtime.custom_update_count("Learn"), 0);
}
