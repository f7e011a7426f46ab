// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Neuron model kind

use super::{dedent, impl_model_base, ModelBase};

/// Neuron update rule with its threshold and reset code
#[derive(Debug, Clone, Default)]
pub struct NeuronModel {
    pub(crate) base: ModelBase,
    pub sim_code: Option<String>,
    pub threshold_condition_code: Option<String>,
    pub reset_code: Option<String>,
    pub support_code: Option<String>,
    /// Extra input variables as `(name, type, initial value)`
    pub additional_input_vars: Vec<(String, String, f64)>,
    pub is_auto_refractory_required: bool,
}

impl_model_base!(NeuronModel);

impl NeuronModel {
    /// Start a custom neuron model
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn sim_code(mut self, code: &str) -> Self {
        self.sim_code = Some(dedent(code));
        self
    }

    pub fn threshold_condition_code(mut self, code: &str) -> Self {
        self.threshold_condition_code = Some(dedent(code));
        self
    }

    pub fn reset_code(mut self, code: &str) -> Self {
        self.reset_code = Some(dedent(code));
        self
    }

    pub fn support_code(mut self, code: &str) -> Self {
        self.support_code = Some(dedent(code));
        self
    }

    pub fn additional_input_vars(mut self, vars: &[(&str, &str, f64)]) -> Self {
        self.additional_input_vars = vars
            .iter()
            .map(|(n, t, v)| (n.to_string(), t.to_string(), *v))
            .collect();
        self
    }

    pub fn auto_refractory(mut self, required: bool) -> Self {
        self.is_auto_refractory_required = required;
        self
    }

    /// Neurons of this kind can emit spikes
    pub fn emits_spikes(&self) -> bool {
        self.threshold_condition_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_neuron_builder() {
        let model = NeuronModel::custom("Counter")
            .param_names(&["limit"])
            .vars(&[("count", "unsigned int")])
            .sim_code("\n    $(count)++;\n")
            .threshold_condition_code("$(count) >= $(limit)")
            .reset_code("$(count) = 0;");

        assert_eq!(model.name(), "Counter");
        assert_eq!(model.base().param_names, vec!["limit"]);
        assert_eq!(model.base().var("count").unwrap().type_name, "unsigned int");
        assert_eq!(model.sim_code.as_deref(), Some("$(count)++;"));
        assert!(model.emits_spikes());
    }
}
