// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Initialisation snippets for variables and connectivity

use super::{dedent, impl_model_base, KernelSizeFn, MaxLengthFn, ModelBase};
use std::fmt;
use std::sync::Arc;

/// Snippet that computes one variable's initial value per element
#[derive(Debug, Clone, Default)]
pub struct InitVarSnippet {
    pub(crate) base: ModelBase,
    pub code: Option<String>,
}

impl_model_base!(InitVarSnippet);

impl InitVarSnippet {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn code(mut self, code: &str) -> Self {
        self.code = Some(dedent(code));
        self
    }
}

/// Loop-carried state variable of a connectivity building loop
#[derive(Debug, Clone, PartialEq)]
pub struct StateVarInit {
    pub name: String,
    pub type_name: String,
    pub value: f64,
}

fn state_vars(vars: &[(&str, &str, f64)]) -> Vec<StateVarInit> {
    vars.iter()
        .map(|(n, t, v)| StateVarInit {
            name: n.to_string(),
            type_name: t.to_string(),
            value: *v,
        })
        .collect()
}

/// Generative rule producing sparse synaptic structure
#[derive(Clone, Default)]
pub struct InitSparseConnectivitySnippet {
    pub(crate) base: ModelBase,
    pub row_build_code: Option<String>,
    pub row_build_state_vars: Vec<StateVarInit>,
    pub col_build_code: Option<String>,
    pub col_build_state_vars: Vec<StateVarInit>,
    pub calc_max_row_length: Option<MaxLengthFn>,
    pub calc_max_col_length: Option<MaxLengthFn>,
    pub calc_kernel_size: Option<KernelSizeFn>,
}

impl_model_base!(InitSparseConnectivitySnippet);

impl InitSparseConnectivitySnippet {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn row_build_code(mut self, code: &str) -> Self {
        self.row_build_code = Some(dedent(code));
        self
    }

    pub fn row_build_state_vars(mut self, vars: &[(&str, &str, f64)]) -> Self {
        self.row_build_state_vars = state_vars(vars);
        self
    }

    pub fn col_build_code(mut self, code: &str) -> Self {
        self.col_build_code = Some(dedent(code));
        self
    }

    pub fn col_build_state_vars(mut self, vars: &[(&str, &str, f64)]) -> Self {
        self.col_build_state_vars = state_vars(vars);
        self
    }

    pub fn calc_max_row_length(
        mut self,
        func: impl Fn(u32, u32, &[f64]) -> u32 + Send + Sync + 'static,
    ) -> Self {
        self.calc_max_row_length = Some(Arc::new(func));
        self
    }

    pub fn calc_max_col_length(
        mut self,
        func: impl Fn(u32, u32, &[f64]) -> u32 + Send + Sync + 'static,
    ) -> Self {
        self.calc_max_col_length = Some(Arc::new(func));
        self
    }

    pub fn calc_kernel_size(mut self, func: impl Fn(&[f64]) -> Vec<u32> + Send + Sync + 'static) -> Self {
        self.calc_kernel_size = Some(Arc::new(func));
        self
    }

    /// Upper bound on synapses per presynaptic neuron, if the snippet declares one
    pub fn max_row_length(&self, num_pre: u32, num_post: u32, params: &[f64]) -> Option<u32> {
        self.calc_max_row_length
            .as_ref()
            .map(|f| f(num_pre, num_post, params))
    }
}

impl fmt::Debug for InitSparseConnectivitySnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitSparseConnectivitySnippet")
            .field("base", &self.base)
            .field("row_build_code", &self.row_build_code)
            .field("col_build_code", &self.col_build_code)
            .finish_non_exhaustive()
    }
}

/// Generative rule for convolution-like (Toeplitz) connectivity
#[derive(Clone, Default)]
pub struct InitToeplitzConnectivitySnippet {
    pub(crate) base: ModelBase,
    pub diagonal_build_code: Option<String>,
    pub diagonal_build_state_vars: Vec<StateVarInit>,
    pub calc_max_row_length: Option<MaxLengthFn>,
    pub calc_kernel_size: Option<KernelSizeFn>,
}

impl_model_base!(InitToeplitzConnectivitySnippet);

impl InitToeplitzConnectivitySnippet {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn diagonal_build_code(mut self, code: &str) -> Self {
        self.diagonal_build_code = Some(dedent(code));
        self
    }

    pub fn diagonal_build_state_vars(mut self, vars: &[(&str, &str, f64)]) -> Self {
        self.diagonal_build_state_vars = state_vars(vars);
        self
    }

    pub fn calc_max_row_length(
        mut self,
        func: impl Fn(u32, u32, &[f64]) -> u32 + Send + Sync + 'static,
    ) -> Self {
        self.calc_max_row_length = Some(Arc::new(func));
        self
    }

    pub fn calc_kernel_size(mut self, func: impl Fn(&[f64]) -> Vec<u32> + Send + Sync + 'static) -> Self {
        self.calc_kernel_size = Some(Arc::new(func));
        self
    }

    pub fn max_row_length(&self, num_pre: u32, num_post: u32, params: &[f64]) -> Option<u32> {
        self.calc_max_row_length
            .as_ref()
            .map(|f| f(num_pre, num_post, params))
    }

    pub fn kernel_size(&self, params: &[f64]) -> Option<Vec<u32>> {
        self.calc_kernel_size.as_ref().map(|f| f(params))
    }
}

impl fmt::Debug for InitToeplitzConnectivitySnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitToeplitzConnectivitySnippet")
            .field("base", &self.base)
            .field("diagonal_build_code", &self.diagonal_build_code)
            .finish_non_exhaustive()
    }
}
