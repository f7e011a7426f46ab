// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Custom update model kind

use super::{dedent, impl_model_base, ModelBase};
use crate::types::VarAccess;

/// Declared variable reference slot of a custom update model
#[derive(Debug, Clone, PartialEq)]
pub struct VarRefDecl {
    pub name: String,
    pub type_name: String,
    pub access: VarAccess,
}

/// Per-timestep computation that reads and writes variables owned by other populations
#[derive(Debug, Clone, Default)]
pub struct CustomUpdateModel {
    pub(crate) base: ModelBase,
    pub var_refs: Vec<VarRefDecl>,
    pub update_code: Option<String>,
}

impl_model_base!(CustomUpdateModel);

impl CustomUpdateModel {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    /// Declare variable references as `(name, type)` pairs
    pub fn var_refs(mut self, refs: &[(&str, &str)]) -> Self {
        self.var_refs = refs
            .iter()
            .map(|(n, t)| VarRefDecl {
                name: n.to_string(),
                type_name: t.to_string(),
                access: VarAccess::ReadWrite,
            })
            .collect();
        self
    }

    pub fn update_code(mut self, code: &str) -> Self {
        self.update_code = Some(dedent(code));
        self
    }

    pub fn var_ref(&self, name: &str) -> Option<&VarRefDecl> {
        self.var_refs.iter().find(|r| r.name == name)
    }
}
