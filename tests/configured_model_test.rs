// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! A model driven from `genn_configuration.toml` through the umbrella crate

#![cfg(feature = "config")]

use genn::config::{load_config, validate_config};
use genn::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_configured_model_runs() {
    let dir = tempdir().unwrap();
    let build_dir = dir.path().join("build");
    fs::create_dir_all(&build_dir).unwrap();
    let config_path = dir.path().join("genn_configuration.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[model]
name = "configured"
precision = "double"
dt = 0.5
model_path = "{}"
recording_timesteps = 4

[backend]
name = "single_threaded_cpu"

[logging]
genn_level = "info"
"#,
            build_dir.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let config = load_config(Some(&config_path), None).unwrap();
    validate_config(&config).unwrap();
    let mut model = GennModel::from_config(&config).unwrap();
    assert_eq!(model.backend_name(), "single_threaded_cpu");
    assert_eq!(model.dt(), 0.5);
    assert_eq!(genn::logging_config(model.options()).genn_level, "info");

    model
        .add_neuron_population("Pop", 4, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();
    model.set_spike_recording_enabled("Pop", true).unwrap();

    model
        .build(&config.model.model_path, config.model.force_rebuild)
        .unwrap();
    model.load(config.model.recording_timesteps).unwrap();
    for _ in 0..4 {
        model.step_time().unwrap();
    }
    assert_eq!(model.timestep().unwrap(), 4);
    assert!((model.t().unwrap() - 2.0).abs() < 1e-9);

    model.pull_recording_buffers_from_device().unwrap();
    assert!(model
        .spec()
        .neuron_population("Pop")
        .unwrap()
        .recorded_spikes
        .is_empty());
    model.end().unwrap();
}

#[test]
fn test_invalid_configuration_rejected_before_construction() {
    let mut config = genn::config::GennConfig::default();
    config.model.precision = "half".to_string();
    let err = GennModel::from_config(&config).unwrap_err();
    assert!(matches!(err, GennError::Configuration(_)));
}
