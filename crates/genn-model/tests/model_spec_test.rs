// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use genn_model::*;

fn spec_with_two_pops() -> ModelSpec {
    let mut spec = ModelSpec::new("integration", Precision::Float);
    spec.add_neuron_population("Pre", 4, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();
    spec.add_neuron_population(
        "Post",
        6,
        "Izhikevich",
        [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
        [("V", -65.0), ("U", -13.0)],
    )
    .unwrap();
    spec
}

#[test]
fn test_synapse_population_by_handle() {
    let mut spec = ModelSpec::new("handles", Precision::Double);
    let pre = spec
        .add_neuron_population("Pre", 4, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();
    let post = spec
        .add_neuron_population("Post", 4, "SpikeSource", NO_PARAMS, NO_VARS)
        .unwrap();

    let syn = spec
        .add_synapse_population(
            SynapseGroupBuilder::new("Syn", MatrixType::DENSE_INDIVIDUALG, &pre, &post)
                .weight_update("StaticPulse", NO_PARAMS, [("g", 0.5)]),
        )
        .unwrap();

    assert_eq!(syn.kind(), PopulationKind::SynapseGroup);
    let sg = spec.synapse_population(syn.name()).unwrap();
    assert_eq!(sg.source(), "Pre");
    assert_eq!(sg.target(), "Post");
    assert_eq!(sg.var("g").unwrap().count, 16);
}

#[test]
fn test_custom_models_register_like_builtins() {
    let mut spec = spec_with_two_pops();
    let neuron = NeuronModel::custom("Leaky")
        .param_names(&["tau"])
        .derived_param("decay", |p, dt| (-dt / p[0]).exp())
        .vars(&[("V", "scalar")])
        .sim_code("$(V) *= $(decay);")
        .threshold_condition_code("$(V) > 1.0")
        .reset_code("$(V) = 0.0;");

    spec.add_neuron_population("Leaky", 3, neuron, [("tau", 20.0)], [("V", 0.0)])
        .unwrap();
    spec.finalize().unwrap();

    let pop = spec.neuron_population("Leaky").unwrap();
    assert_eq!(pop.model_name(), "Leaky");
    assert_eq!(pop.derived_params()[0].0, "decay");
}

#[test]
fn test_explicit_sparse_connections() {
    let mut spec = spec_with_two_pops();
    spec.add_synapse_population(
        SynapseGroupBuilder::new("Syn", MatrixType::SPARSE_INDIVIDUALG, "Pre", "Post")
            .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)]),
    )
    .unwrap();

    let sg = spec.synapse_population_mut("Syn").unwrap();
    sg.set_sparse_connections(&[0, 0, 3], &[1, 5, 2]).unwrap();
    assert_eq!(sg.connectivity.as_ref().unwrap().num_synapses(), 3);
    assert!(sg.set_sparse_connections(&[0], &[6]).is_err());
}

#[test]
fn test_dense_projection_rejects_explicit_connections() {
    let mut spec = spec_with_two_pops();
    spec.add_synapse_population(
        SynapseGroupBuilder::new("Dense", MatrixType::DENSE_INDIVIDUALG, "Pre", "Post")
            .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)]),
    )
    .unwrap();
    let err = spec
        .synapse_population_mut("Dense")
        .unwrap()
        .set_sparse_connections(&[0], &[0])
        .unwrap_err();
    assert!(matches!(err, GennError::InvalidModel(_)));
}

#[test]
fn test_transpose_var_ref_requires_matching_shape() {
    let mut spec = spec_with_two_pops();
    spec.add_synapse_population(
        SynapseGroupBuilder::new("Forward", MatrixType::DENSE_INDIVIDUALG, "Pre", "Post")
            .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)]),
    )
    .unwrap();
    spec.add_synapse_population(
        SynapseGroupBuilder::new("Backward", MatrixType::DENSE_INDIVIDUALG, "Post", "Pre")
            .weight_update("StaticPulse", NO_PARAMS, [("g", 0.0)]),
    )
    .unwrap();

    let forward = spec.synapse_population("Forward").unwrap();
    let backward = spec.synapse_population("Backward").unwrap();
    let var_ref = create_wu_var_ref(forward, "g", Some((backward, "g"))).unwrap();
    assert_eq!(var_ref.count(), 24);

    assert!(create_wu_var_ref(forward, "g", Some((forward, "g"))).is_err());
}

#[test]
fn test_spike_source_array_egp_needs_allocation() {
    let mut spec = ModelSpec::new("ssa", Precision::Float);
    spec.add_neuron_population(
        "Input",
        2,
        "SpikeSourceArray",
        NO_PARAMS,
        [("startSpike", vec![0.0, 2.0]), ("endSpike", vec![2.0, 3.0])],
    )
    .unwrap();

    let pop = spec.neuron_population("Input").unwrap();
    let egp = pop.extra_global_param("spikeTimes").unwrap();
    assert!(egp.needs_allocation);
    assert!(!egp.used_in_init);
}

#[test]
fn test_var_init_snippet_egps_are_init_egps() {
    let snippet = InitVarSnippet::custom("FromArray")
        .extra_global_params(&[("values", "scalar*")])
        .code("$(value) = $(values)[$(id)];");

    let mut spec = ModelSpec::new("init_egp", Precision::Float);
    spec.add_neuron_population(
        "Pop",
        2,
        "Izhikevich",
        [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
        [
            ("V", init_var(snippet, NO_PARAMS).unwrap()),
            ("U", VarInit::Constant(0.0)),
        ],
    )
    .unwrap();

    let egp = spec
        .neuron_population("Pop")
        .unwrap()
        .extra_global_param("valuesV")
        .unwrap();
    assert!(egp.used_in_init);
}

#[test]
fn test_unknown_var_type_rejected_at_registration() {
    let mut spec = ModelSpec::new("typo", Precision::Float);
    let typo = NeuronModel::custom("Typo")
        .vars(&[("V", "sclar")])
        .threshold_condition_code("$(V) > 0.0");

    let err = spec
        .add_neuron_population("Pop", 4, typo, NO_PARAMS, [("V", 0.0)])
        .unwrap_err();
    assert!(matches!(err, GennError::InvalidModel(ref msg) if msg.contains("sclar")));
    assert!(spec.neuron_population("Pop").is_none());

    let fixed = NeuronModel::custom("Fixed")
        .vars(&[("V", "scalar")])
        .threshold_condition_code("$(V) > 0.0");
    spec.add_neuron_population("Pop", 4, fixed, NO_PARAMS, [("V", 0.0)])
        .unwrap();
    spec.finalize().unwrap();
}
