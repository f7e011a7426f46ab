// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Backend selection
//!
//! Backends are tried in a fixed preference order, most capable first.
//! An explicit name bypasses the order but must name a registered backend
//! that is available on this host.

use crate::backend::BackendFactory;
use crate::single_threaded_cpu::SingleThreadedCpuFactory;
use genn_model::{GennError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Backends in preference order
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: Vec<Arc<dyn BackendFactory>>,
}

/// Outcome of backend selection
#[derive(Clone)]
pub struct BackendDecision {
    pub factory: Arc<dyn BackendFactory>,
    pub reason: String,
}

impl fmt::Debug for BackendDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDecision")
            .field("backend", &self.factory.name())
            .field("reason", &self.reason)
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the backends compiled into this build
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SingleThreadedCpuFactory));
        registry
    }

    /// Append a backend at the lowest preference
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        debug!(target: "genn_backend", "Registered backend '{}'", factory.name());
        self.factories.push(factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BackendFactory>> {
        self.factories.iter().find(|f| f.name() == name)
    }

    /// Resolve to exactly one backend.
    ///
    /// With no explicit name, the first available backend wins; if none is
    /// available this is a configuration error. An explicit name that is
    /// unknown or unavailable is `NotFound`.
    pub fn select(&self, explicit: Option<&str>) -> Result<BackendDecision> {
        if let Some(name) = explicit {
            let factory = self
                .get(name)
                .ok_or_else(|| GennError::not_found("backend", name, "backend"))?;
            if !factory.is_available() {
                info!(target: "genn_backend", "Backend '{}' is not available on this host", name);
                return Err(GennError::not_found("backend", name, "backend"));
            }
            info!(target: "genn_backend", "Using requested backend '{}'", name);
            return Ok(BackendDecision {
                factory: Arc::clone(factory),
                reason: format!("'{}' requested explicitly", name),
            });
        }

        for (rank, factory) in self.factories.iter().enumerate() {
            if factory.is_available() {
                info!(
                    target: "genn_backend",
                    "Selected backend '{}' (preference {} of {})",
                    factory.name(),
                    rank + 1,
                    self.factories.len()
                );
                return Ok(BackendDecision {
                    factory: Arc::clone(factory),
                    reason: format!("first available in preference order {:?}", self.names()),
                });
            }
            debug!(target: "genn_backend", "Backend '{}' unavailable, trying next", factory.name());
        }

        Err(GennError::configuration(format!(
            "No GeNN backend is available on this host (tried {:?})",
            self.names()
        )))
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
