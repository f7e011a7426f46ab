// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Current source model kind

use super::{dedent, impl_model_base, ModelBase};

#[derive(Debug, Clone, Default)]
pub struct CurrentSourceModel {
    pub(crate) base: ModelBase,
    pub injection_code: Option<String>,
}

impl_model_base!(CurrentSourceModel);

impl CurrentSourceModel {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: ModelBase::new(name),
            ..Default::default()
        }
    }

    pub fn injection_code(mut self, code: &str) -> Self {
        self.injection_code = Some(dedent(code));
        self
    }
}
