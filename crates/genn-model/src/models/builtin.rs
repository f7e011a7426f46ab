// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Built-in model library
//!
//! Standard model kinds resolvable by name. Anything accepting a model kind
//! takes either a descriptor value, a shared `Arc` of one, or the name of a
//! built-in through [`IntoModel`].

use super::{
    CurrentSourceModel, CustomUpdateModel, InitSparseConnectivitySnippet,
    InitToeplitzConnectivitySnippet, InitVarSnippet, NeuronModel, PostsynapticModel,
    WeightUpdateModel,
};
use crate::error::{GennError, Result};
use std::sync::Arc;

/// Conversion into a shared model-kind descriptor
pub trait IntoModel<T> {
    fn into_model(self) -> Result<Arc<T>>;
}

macro_rules! impl_into_model {
    ($ty:ty, $lookup:path, $kind:expr) => {
        impl IntoModel<$ty> for $ty {
            fn into_model(self) -> Result<Arc<$ty>> {
                Ok(Arc::new(self))
            }
        }

        impl IntoModel<$ty> for Arc<$ty> {
            fn into_model(self) -> Result<Arc<$ty>> {
                Ok(self)
            }
        }

        impl IntoModel<$ty> for &Arc<$ty> {
            fn into_model(self) -> Result<Arc<$ty>> {
                Ok(Arc::clone(self))
            }
        }

        impl IntoModel<$ty> for &str {
            fn into_model(self) -> Result<Arc<$ty>> {
                $lookup(self)
                    .map(Arc::new)
                    .ok_or_else(|| GennError::not_found($kind, self, "model"))
            }
        }

        impl IntoModel<$ty> for String {
            fn into_model(self) -> Result<Arc<$ty>> {
                self.as_str().into_model()
            }
        }
    };
}

impl_into_model!(NeuronModel, neuron_model, "neuron model");
impl_into_model!(PostsynapticModel, postsynaptic_model, "postsynaptic model");
impl_into_model!(WeightUpdateModel, weight_update_model, "weight update model");
impl_into_model!(CurrentSourceModel, current_source_model, "current source model");
impl_into_model!(CustomUpdateModel, custom_update_model, "custom update model");
impl_into_model!(InitVarSnippet, init_var_snippet, "variable init snippet");
impl_into_model!(
    InitSparseConnectivitySnippet,
    sparse_connectivity_snippet,
    "sparse connectivity snippet"
);
impl_into_model!(
    InitToeplitzConnectivitySnippet,
    toeplitz_connectivity_snippet,
    "toeplitz connectivity snippet"
);

/// Look up a built-in neuron model
pub fn neuron_model(name: &str) -> Option<NeuronModel> {
    let model = match name {
        "LIF" => NeuronModel::custom("LIF")
            .param_names(&["C", "TauM", "Vrest", "Vreset", "Vthresh", "Ioffset", "TauRefrac"])
            .derived_param("ExpTC", |p, dt| (-dt / p[1]).exp())
            .derived_param("Rmembrane", |p, _| p[1] / p[0])
            .vars(&[("V", "scalar"), ("RefracTime", "scalar")])
            .sim_code(
                "if ($(RefracTime) <= 0.0) {
                   scalar alpha = (($(Isyn) + $(Ioffset)) * $(Rmembrane)) + $(Vrest);
                   $(V) = alpha - ($(ExpTC) * (alpha - $(V)));
                 }
                 else {
                   $(RefracTime) -= DT;
                 }",
            )
            .threshold_condition_code("$(RefracTime) <= 0.0 && $(V) >= $(Vthresh)")
            .reset_code(
                "$(V) = $(Vreset);
                 $(RefracTime) = $(TauRefrac);",
            )
            .auto_refractory(true),
        "Izhikevich" => NeuronModel::custom("Izhikevich")
            .param_names(&["a", "b", "c", "d"])
            .vars(&[("V", "scalar"), ("U", "scalar")])
            .sim_code(
                "if ($(V) >= 30.0) {
                   $(V) = $(c);
                   $(U) += $(d);
                 }
                 $(V) += 0.5 * (0.04 * $(V) * $(V) + 5.0 * $(V) + 140.0 - $(U) + $(Isyn)) * DT;
                 $(V) += 0.5 * (0.04 * $(V) * $(V) + 5.0 * $(V) + 140.0 - $(U) + $(Isyn)) * DT;
                 $(U) += $(a) * ($(b) * $(V) - $(U)) * DT;",
            )
            .threshold_condition_code("$(V) >= 29.99"),
        "Poisson" => NeuronModel::custom("Poisson")
            .param_names(&["rate"])
            .derived_param("probSpike", |p, dt| p[0] * dt / 1000.0)
            .vars(&[("timeStepToSpike", "scalar")])
            .threshold_condition_code("$(gennrand_uniform) >= exp(-$(probSpike))"),
        "SpikeSource" => NeuronModel::custom("SpikeSource").threshold_condition_code("0"),
        "SpikeSourceArray" => NeuronModel::custom("SpikeSourceArray")
            .vars(&[("startSpike", "unsigned int"), ("endSpike", "unsigned int")])
            .extra_global_params(&[("spikeTimes", "scalar*")])
            .threshold_condition_code(
                "$(startSpike) != $(endSpike) && $(t) >= $(spikeTimes)[$(startSpike)]",
            )
            .reset_code("$(startSpike)++;"),
        _ => return None,
    };
    Some(model)
}

/// Look up a built-in postsynaptic model
pub fn postsynaptic_model(name: &str) -> Option<PostsynapticModel> {
    let model = match name {
        "DeltaCurr" => PostsynapticModel::custom("DeltaCurr")
            .apply_input_code("$(Isyn) += $(inSyn); $(inSyn) = 0;"),
        "ExpCurr" => PostsynapticModel::custom("ExpCurr")
            .param_names(&["tau"])
            .derived_param("expDecay", |p, dt| (-dt / p[0]).exp())
            .derived_param("init", |p, dt| (p[0] * (1.0 - (-dt / p[0]).exp())) / dt)
            .decay_code("$(inSyn) *= $(expDecay);")
            .apply_input_code("$(Isyn) += $(init) * $(inSyn);"),
        _ => return None,
    };
    Some(model)
}

/// Look up a built-in weight-update model
pub fn weight_update_model(name: &str) -> Option<WeightUpdateModel> {
    let model = match name {
        "StaticPulse" => WeightUpdateModel::custom("StaticPulse")
            .vars(&[("g", "scalar")])
            .sim_code("$(addToInSyn, $(g));"),
        "StaticPulseDendriticDelay" => WeightUpdateModel::custom("StaticPulseDendriticDelay")
            .vars(&[("g", "scalar"), ("d", "uint8_t")])
            .sim_code("$(addToInSynDelay, $(g), $(d));"),
        "StaticGraded" => WeightUpdateModel::custom("StaticGraded")
            .param_names(&["Epre", "Vslope"])
            .vars(&[("g", "scalar")])
            .event_code("$(addToInSyn, fmax(0.0, $(g) * tanh(($(V_pre) - $(Epre)) / $(Vslope)) * DT));")
            .event_threshold_condition_code("$(V_pre) > $(Epre)"),
        _ => return None,
    };
    Some(model)
}

/// Look up a built-in current source model
pub fn current_source_model(name: &str) -> Option<CurrentSourceModel> {
    let model = match name {
        "DC" => CurrentSourceModel::custom("DC")
            .param_names(&["amp"])
            .injection_code("$(injectCurrent, $(amp));"),
        "GaussianNoise" => CurrentSourceModel::custom("GaussianNoise")
            .param_names(&["mean", "sd"])
            .injection_code("$(injectCurrent, $(mean) + $(gennrand_normal) * $(sd));"),
        _ => return None,
    };
    Some(model)
}

/// There are no built-in custom update models; every one is user supplied
pub fn custom_update_model(_name: &str) -> Option<CustomUpdateModel> {
    None
}

/// Look up a built-in variable initialisation snippet
pub fn init_var_snippet(name: &str) -> Option<InitVarSnippet> {
    let snippet = match name {
        "Constant" => InitVarSnippet::custom("Constant")
            .param_names(&["constant"])
            .code("$(value) = $(constant);"),
        "Uniform" => InitVarSnippet::custom("Uniform")
            .param_names(&["min", "max"])
            .code(
                "const scalar scale = $(max) - $(min);
                 $(value) = $(min) + ($(gennrand_uniform) * scale);",
            ),
        "Normal" => InitVarSnippet::custom("Normal")
            .param_names(&["mean", "sd"])
            .code("$(value) = $(mean) + ($(gennrand_normal) * $(sd));"),
        "Exponential" => InitVarSnippet::custom("Exponential")
            .param_names(&["lambda"])
            .code("$(value) = $(lambda) * $(gennrand_exponential);"),
        _ => return None,
    };
    Some(snippet)
}

/// Look up a built-in sparse connectivity snippet
pub fn sparse_connectivity_snippet(name: &str) -> Option<InitSparseConnectivitySnippet> {
    let snippet = match name {
        "OneToOne" => InitSparseConnectivitySnippet::custom("OneToOne")
            .row_build_code("$(addSynapse, $(id_pre));\n$(endRow);")
            .calc_max_row_length(|_, _, _| 1)
            .calc_max_col_length(|_, _, _| 1),
        "FixedProbability" => InitSparseConnectivitySnippet::custom("FixedProbability")
            .param_names(&["prob"])
            .derived_param("probLogRecip", |p, _| 1.0 / (1.0 - p[0]).ln())
            .row_build_code(
                "const scalar u = $(gennrand_uniform);
                 prevJ += (1 + (int)(log(u) * $(probLogRecip)));
                 if(prevJ < $(num_post)) {
                   $(addSynapse, prevJ);
                 }
                 else {
                   $(endRow);
                 }",
            )
            .row_build_state_vars(&[("prevJ", "int", -1.0)])
            .calc_max_row_length(|_, num_post, p| binomial_upper_bound(num_post, p[0]))
            .calc_max_col_length(|num_pre, _, p| binomial_upper_bound(num_pre, p[0])),
        "FixedProbabilityNoAutapse" => {
            InitSparseConnectivitySnippet::custom("FixedProbabilityNoAutapse")
                .param_names(&["prob"])
                .derived_param("probLogRecip", |p, _| 1.0 / (1.0 - p[0]).ln())
                .row_build_code(
                    "int nextJ;
                     do {
                       const scalar u = $(gennrand_uniform);
                       nextJ = prevJ + (1 + (int)(log(u) * $(probLogRecip)));
                     } while(nextJ == $(id_pre));
                     prevJ = nextJ;
                     if(prevJ < $(num_post)) {
                       $(addSynapse, prevJ);
                     }
                     else {
                       $(endRow);
                     }",
                )
                .row_build_state_vars(&[("prevJ", "int", -1.0)])
                .calc_max_row_length(|_, num_post, p| binomial_upper_bound(num_post, p[0]))
                .calc_max_col_length(|num_pre, _, p| binomial_upper_bound(num_pre, p[0]))
        }
        "FixedNumberPostWithReplacement" => {
            InitSparseConnectivitySnippet::custom("FixedNumberPostWithReplacement")
                .param_names(&["rowLength"])
                .row_build_code(
                    "if(c == 0) {
                       $(endRow);
                     }
                     const scalar u = $(gennrand_uniform);
                     x += (1.0 - x) * (1.0 - pow(u, 1.0 / (scalar)c));
                     unsigned int postIdx = (unsigned int)(x * $(num_post));
                     postIdx = (postIdx < $(num_post)) ? postIdx : ($(num_post) - 1);
                     $(addSynapse, postIdx);
                     c--;",
                )
                .row_build_state_vars(&[("x", "scalar", 0.0), ("c", "unsigned int", 0.0)])
                .calc_max_row_length(|_, _, p| p[0] as u32)
        }
        _ => return None,
    };
    Some(snippet)
}

/// Look up a built-in Toeplitz connectivity snippet
pub fn toeplitz_connectivity_snippet(name: &str) -> Option<InitToeplitzConnectivitySnippet> {
    let snippet = match name {
        "Conv2D" => InitToeplitzConnectivitySnippet::custom("Conv2D")
            .param_names(&[
                "conv_kh", "conv_kw", "conv_ih", "conv_iw", "conv_ic", "conv_oh", "conv_ow",
                "conv_oc",
            ])
            .diagonal_build_code(
                "const int kernRow = ($(id_diag) / (int)$(conv_oc)) / (int)$(conv_kw);
                 const int kernCol = ($(id_diag) / (int)$(conv_oc)) % (int)$(conv_kw);
                 const int kernOutChan = $(id_diag) % (int)$(conv_oc);",
            )
            .calc_max_row_length(|_, _, p| (p[0] * p[1] * p[7]) as u32)
            .calc_kernel_size(|p| vec![p[0] as u32, p[1] as u32, p[4] as u32, p[7] as u32]),
        _ => return None,
    };
    Some(snippet)
}

/// Row length that a binomial(n, p) draw stays below with very high probability
fn binomial_upper_bound(n: u32, p: f64) -> u32 {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    let mean = n as f64 * p;
    let sd = (mean * (1.0 - p)).sqrt();
    ((mean + 6.0 * sd).ceil() as u32).min(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_by_name() {
        let lif: Arc<NeuronModel> = "LIF".into_model().unwrap();
        assert_eq!(lif.name(), "LIF");
        assert_eq!(lif.base().param_names.len(), 7);
        assert!(lif.base().var("RefracTime").is_some());

        let static_pulse: Arc<WeightUpdateModel> = "StaticPulse".into_model().unwrap();
        assert!(static_pulse.base().var("g").is_some());
    }

    #[test]
    fn test_unknown_builtin_is_not_found() {
        let result: Result<Arc<NeuronModel>> = "HodgkinHuxleyX".into_model();
        let err = result.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("HodgkinHuxleyX"));
    }

    #[test]
    fn test_binomial_upper_bound_limits() {
        assert_eq!(binomial_upper_bound(100, 1.0), 100);
        assert_eq!(binomial_upper_bound(100, 0.0), 0);
        let bound = binomial_upper_bound(1000, 0.1);
        assert!(bound > 100 && bound < 1000);
    }

    #[test]
    fn test_one_to_one_row_length() {
        let snippet = sparse_connectivity_snippet("OneToOne").unwrap();
        assert_eq!(snippet.max_row_length(50, 50, &[]), Some(1));
    }
}
