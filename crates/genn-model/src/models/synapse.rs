// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Postsynaptic and weight-update model kinds

use super::{dedent, impl_model_base, ModelBase, Var};

/// Postsynaptic model: how synaptic input decays and is applied to the target
#[derive(Debug, Clone, Default)]
pub struct PostsynapticModel {
    pub(crate) base: ModelBase,
    pub decay_code: Option<String>,
    pub apply_input_code: Option<String>,
    pub support_code: Option<String>,
}

impl_model_base!(PostsynapticModel);

impl PostsynapticModel {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn decay_code(mut self, code: &str) -> Self {
        self.decay_code = Some(dedent(code));
        self
    }

    pub fn apply_input_code(mut self, code: &str) -> Self {
        self.apply_input_code = Some(dedent(code));
        self
    }

    pub fn support_code(mut self, code: &str) -> Self {
        self.support_code = Some(dedent(code));
        self
    }
}

/// Code hooks of a weight-update model
#[derive(Debug, Clone, Default)]
pub struct WeightUpdateCode {
    pub sim_code: Option<String>,
    pub event_code: Option<String>,
    pub learn_post_code: Option<String>,
    pub synapse_dynamics_code: Option<String>,
    pub event_threshold_condition_code: Option<String>,
    pub pre_spike_code: Option<String>,
    pub post_spike_code: Option<String>,
    pub pre_dynamics_code: Option<String>,
    pub post_dynamics_code: Option<String>,
    pub sim_support_code: Option<String>,
    pub learn_post_support_code: Option<String>,
    pub synapse_dynamics_support_code: Option<String>,
}

/// Spike timing data the generated code must keep for this model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpikeTimeRequirements {
    pub pre_spike_time: bool,
    pub post_spike_time: bool,
    pub pre_spike_event_time: bool,
    pub prev_pre_spike_time: bool,
    pub prev_post_spike_time: bool,
    pub prev_pre_spike_event_time: bool,
}

/// Weight-update model: per-synapse, presynaptic and postsynaptic state plus update code
#[derive(Debug, Clone, Default)]
pub struct WeightUpdateModel {
    pub(crate) base: ModelBase,
    pub pre_vars: Vec<Var>,
    pub post_vars: Vec<Var>,
    pub code: WeightUpdateCode,
    pub spike_times: SpikeTimeRequirements,
}

impl_model_base!(WeightUpdateModel);

impl WeightUpdateModel {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn pre_vars(mut self, vars: &[(&str, &str)]) -> Self {
        self.pre_vars = vars.iter().map(|(n, t)| Var::new(*n, *t)).collect();
        self
    }

    pub fn post_vars(mut self, vars: &[(&str, &str)]) -> Self {
        self.post_vars = vars.iter().map(|(n, t)| Var::new(*n, *t)).collect();
        self
    }

    pub fn sim_code(mut self, code: &str) -> Self {
        self.code.sim_code = Some(dedent(code));
        self
    }

    pub fn event_code(mut self, code: &str) -> Self {
        self.code.event_code = Some(dedent(code));
        self
    }

    pub fn learn_post_code(mut self, code: &str) -> Self {
        self.code.learn_post_code = Some(dedent(code));
        self
    }

    pub fn synapse_dynamics_code(mut self, code: &str) -> Self {
        self.code.synapse_dynamics_code = Some(dedent(code));
        self
    }

    pub fn event_threshold_condition_code(mut self, code: &str) -> Self {
        self.code.event_threshold_condition_code = Some(dedent(code));
        self
    }

    pub fn pre_spike_code(mut self, code: &str) -> Self {
        self.code.pre_spike_code = Some(dedent(code));
        self
    }

    pub fn post_spike_code(mut self, code: &str) -> Self {
        self.code.post_spike_code = Some(dedent(code));
        self
    }

    pub fn pre_dynamics_code(mut self, code: &str) -> Self {
        self.code.pre_dynamics_code = Some(dedent(code));
        self
    }

    pub fn post_dynamics_code(mut self, code: &str) -> Self {
        self.code.post_dynamics_code = Some(dedent(code));
        self
    }

    pub fn sim_support_code(mut self, code: &str) -> Self {
        self.code.sim_support_code = Some(dedent(code));
        self
    }

    pub fn learn_post_support_code(mut self, code: &str) -> Self {
        self.code.learn_post_support_code = Some(dedent(code));
        self
    }

    pub fn synapse_dynamics_support_code(mut self, code: &str) -> Self {
        self.code.synapse_dynamics_support_code = Some(dedent(code));
        self
    }

    pub fn spike_time_requirements(mut self, requirements: SpikeTimeRequirements) -> Self {
        self.spike_times = requirements;
        self
    }

    pub fn pre_var(&self, name: &str) -> Option<&Var> {
        self.pre_vars.iter().find(|v| v.name == name)
    }

    pub fn post_var(&self, name: &str) -> Option<&Var> {
        self.post_vars.iter().find(|v| v.name == name)
    }

    /// Model reacts to presynaptic spike-like events
    pub fn uses_spike_events(&self) -> bool {
        self.code.event_threshold_condition_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_update_pre_post_vars() {
        let model = WeightUpdateModel::custom("STDP")
            .param_names(&["tauPlus", "tauMinus"])
            .vars(&[("g", "scalar")])
            .pre_vars(&[("preTrace", "scalar")])
            .post_vars(&[("postTrace", "scalar")])
            .sim_code("$(addToInSyn, $(g));");

        assert!(model.pre_var("preTrace").is_some());
        assert!(model.post_var("postTrace").is_some());
        assert!(model.pre_var("postTrace").is_none());
        assert!(!model.uses_spike_events());
    }
}
