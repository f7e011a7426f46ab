// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model-kind descriptors
//!
//! A model kind is the compute rule a population runs, together with the
//! parameters, state variables and extra global parameters it declares.
//! Custom kinds are plain values built with the `custom(...)` constructors;
//! the code generator interprets every kind uniformly.

pub mod builtin;
pub mod current_source;
pub mod custom_update;
pub mod neuron;
pub mod snippets;
pub mod synapse;

pub use current_source::CurrentSourceModel;
pub use custom_update::{CustomUpdateModel, VarRefDecl};
pub use neuron::NeuronModel;
pub use snippets::{
    InitSparseConnectivitySnippet, InitToeplitzConnectivitySnippet, InitVarSnippet, StateVarInit,
};
pub use synapse::{PostsynapticModel, WeightUpdateModel};

use crate::types::VarAccess;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Derived parameter function: `(param values, dt) -> value`
pub type DerivedParamFn = Arc<dyn Fn(&[f64], f64) -> f64 + Send + Sync>;

/// Maximum row/column length function: `(num_pre, num_post, param values) -> length`
pub type MaxLengthFn = Arc<dyn Fn(u32, u32, &[f64]) -> u32 + Send + Sync>;

/// Kernel size function: `param values -> kernel dimensions`
pub type KernelSizeFn = Arc<dyn Fn(&[f64]) -> Vec<u32> + Send + Sync>;

/// State variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    pub type_name: String,
    pub access: VarAccess,
}

impl Var {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            access: VarAccess::ReadWrite,
        }
    }

    pub fn with_access(mut self, access: VarAccess) -> Self {
        self.access = access;
        self
    }
}

/// Extra global parameter declaration (array-valued, shared by every unit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Egp {
    pub name: String,
    pub type_name: String,
}

impl Egp {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Element type with any pointer suffix removed
    pub fn element_type(&self) -> &str {
        self.type_name.trim_end_matches('*').trim()
    }
}

/// Parameter computed from the declared parameters and the timestep
#[derive(Clone)]
pub struct DerivedParam {
    pub name: String,
    pub func: DerivedParamFn,
}

impl DerivedParam {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn evaluate(&self, params: &[f64], dt: f64) -> f64 {
        (self.func)(params, dt)
    }
}

impl fmt::Debug for DerivedParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedParam")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Declarations every model kind carries
#[derive(Debug, Clone, Default)]
pub struct ModelBase {
    pub name: String,
    pub param_names: Vec<String>,
    pub vars: Vec<Var>,
    pub derived_params: Vec<DerivedParam>,
    pub extra_global_params: Vec<Egp>,
}

impl ModelBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|p| p == name)
    }

    pub fn var(&self, name: &str) -> Option<&Var> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn egp(&self, name: &str) -> Option<&Egp> {
        self.extra_global_params.iter().find(|e| e.name == name)
    }

    /// Evaluate every derived parameter against ordered parameter values
    pub fn derived_values(&self, params: &[f64], dt: f64) -> Vec<(String, f64)> {
        self.derived_params
            .iter()
            .map(|d| (d.name.clone(), d.evaluate(params, dt)))
            .collect()
    }
}

/// Common builder and accessor methods for every model kind
macro_rules! impl_model_base {
    ($ty:ty) => {
        impl $ty {
            pub fn name(&self) -> &str {
                &self.base.name
            }

            pub fn base(&self) -> &$crate::models::ModelBase {
                &self.base
            }

            pub fn param_names(mut self, names: &[&str]) -> Self {
                self.base.param_names = names.iter().map(|n| n.to_string()).collect();
                self
            }

            /// Declare state variables as `(name, type)` pairs
            pub fn vars(mut self, vars: &[(&str, &str)]) -> Self {
                self.base.vars = vars
                    .iter()
                    .map(|(n, t)| $crate::models::Var::new(*n, *t))
                    .collect();
                self
            }

            pub fn var_decls(mut self, vars: Vec<$crate::models::Var>) -> Self {
                self.base.vars = vars;
                self
            }

            pub fn derived_param(
                mut self,
                name: &str,
                func: impl Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
            ) -> Self {
                self.base
                    .derived_params
                    .push($crate::models::DerivedParam::new(name, func));
                self
            }

            /// Declare extra global parameters as `(name, type)` pairs
            pub fn extra_global_params(mut self, egps: &[(&str, &str)]) -> Self {
                self.base.extra_global_params = egps
                    .iter()
                    .map(|(n, t)| $crate::models::Egp::new(*n, *t))
                    .collect();
                self
            }
        }
    };
}

pub(crate) use impl_model_base;

/// Strip the common leading whitespace from every line of a code string
pub fn dedent(code: &str) -> String {
    let indent = code
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    code.lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedent_removes_common_indent() {
        let code = "\n        $(V) += 1.0;\n          if ($(V) > 2) {}\n    ";
        assert_eq!(dedent(code), "$(V) += 1.0;\n  if ($(V) > 2) {}");
    }

    #[test]
    fn test_derived_params_evaluate_in_order() {
        let mut base = ModelBase::new("Test");
        base.param_names = vec!["tau".to_string()];
        base.derived_params
            .push(DerivedParam::new("ExpTC", |p, dt| (-dt / p[0]).exp()));

        let derived = base.derived_values(&[20.0], 0.1);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].0, "ExpTC");
        assert!((derived[0].1 - (-0.1f64 / 20.0).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_egp_element_type() {
        assert_eq!(Egp::new("spikeTimes", "scalar*").element_type(), "scalar");
        assert_eq!(Egp::new("rate", "float").element_type(), "float");
    }
}
