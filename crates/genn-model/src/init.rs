// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Parameter resolution and variable / connectivity initialisers

use crate::error::{GennError, Result};
use crate::models::builtin::IntoModel;
use crate::models::{
    InitSparseConnectivitySnippet, InitToeplitzConnectivitySnippet, InitVarSnippet, ModelBase, Var,
};
use std::sync::Arc;

/// How a variable receives its initial value
#[derive(Debug, Clone, Default)]
pub enum VarInit {
    /// Left for the caller to push before use
    #[default]
    Uninitialised,
    /// Same value for every element
    Constant(f64),
    /// Explicit per-element values
    Values(Vec<f64>),
    /// Computed per element by an initialisation snippet
    Snippet {
        snippet: Arc<InitVarSnippet>,
        params: Vec<f64>,
    },
}

impl VarInit {
    pub fn is_uninitialised(&self) -> bool {
        matches!(self, VarInit::Uninitialised)
    }

    /// Snippet initialisers need the generated initialisation kernel
    pub fn requires_kernel(&self) -> bool {
        matches!(self, VarInit::Snippet { .. })
    }
}

impl From<f64> for VarInit {
    fn from(value: f64) -> Self {
        VarInit::Constant(value)
    }
}

impl From<Vec<f64>> for VarInit {
    fn from(values: Vec<f64>) -> Self {
        VarInit::Values(values)
    }
}

impl From<&[f64]> for VarInit {
    fn from(values: &[f64]) -> Self {
        VarInit::Values(values.to_vec())
    }
}

/// Create a snippet-driven variable initialiser
pub fn init_var<S, I, K>(snippet: S, params: I) -> Result<VarInit>
where
    S: IntoModel<InitVarSnippet>,
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let snippet = snippet.into_model()?;
    let params = resolve_params(snippet.base(), params, snippet.name())?;
    Ok(VarInit::Snippet { snippet, params })
}

/// Sparse connectivity initialiser: a snippet plus its parameter values
#[derive(Debug, Clone)]
pub struct ConnectivityInit {
    pub snippet: Arc<InitSparseConnectivitySnippet>,
    pub params: Vec<f64>,
}

impl ConnectivityInit {
    pub fn max_row_length(&self, num_pre: u32, num_post: u32) -> Option<u32> {
        self.snippet.max_row_length(num_pre, num_post, &self.params)
    }
}

/// Create a sparse connectivity initialiser
pub fn init_connectivity<S, I, K>(snippet: S, params: I) -> Result<ConnectivityInit>
where
    S: IntoModel<InitSparseConnectivitySnippet>,
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let snippet = snippet.into_model()?;
    let params = resolve_params(snippet.base(), params, snippet.name())?;
    Ok(ConnectivityInit { snippet, params })
}

/// Toeplitz connectivity initialiser
#[derive(Debug, Clone)]
pub struct ToeplitzInit {
    pub snippet: Arc<InitToeplitzConnectivitySnippet>,
    pub params: Vec<f64>,
}

impl ToeplitzInit {
    pub fn max_row_length(&self, num_pre: u32, num_post: u32) -> Option<u32> {
        self.snippet.max_row_length(num_pre, num_post, &self.params)
    }
}

/// Create a Toeplitz connectivity initialiser
pub fn init_toeplitz_connectivity<S, I, K>(snippet: S, params: I) -> Result<ToeplitzInit>
where
    S: IntoModel<InitToeplitzConnectivitySnippet>,
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let snippet = snippet.into_model()?;
    let params = resolve_params(snippet.base(), params, snippet.name())?;
    Ok(ToeplitzInit { snippet, params })
}

/// Order a name→value mapping by the model's declared parameter names.
///
/// Every declared parameter must be supplied and no undeclared name may appear.
pub fn resolve_params<I, K>(base: &ModelBase, params: I, owner: &str) -> Result<Vec<f64>>
where
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let mut values: Vec<Option<f64>> = vec![None; base.param_names.len()];
    for (name, value) in params {
        let name = name.as_ref();
        let index = base.param_index(name).ok_or_else(|| {
            GennError::invalid_model(format!(
                "'{}' has no parameter named '{}'",
                owner, name
            ))
        })?;
        values[index] = Some(value);
    }

    values
        .into_iter()
        .zip(&base.param_names)
        .map(|(value, name)| {
            value.ok_or_else(|| {
                GennError::invalid_model(format!(
                    "Missing value for parameter '{}' of '{}'",
                    name, owner
                ))
            })
        })
        .collect()
}

/// Match initialisers to declared variables, in declaration order.
///
/// Variables without an entry stay uninitialised; undeclared names are rejected.
pub fn resolve_var_inits<I, K, V>(decls: &[Var], vars: I, owner: &str) -> Result<Vec<VarInit>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<VarInit>,
{
    let mut inits: Vec<VarInit> = vec![VarInit::Uninitialised; decls.len()];
    for (name, init) in vars {
        let name = name.as_ref();
        let index = decls.iter().position(|v| v.name == name).ok_or_else(|| {
            GennError::invalid_model(format!("'{}' has no variable named '{}'", owner, name))
        })?;
        inits[index] = init.into();
    }
    Ok(inits)
}
