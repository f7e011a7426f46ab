// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use genn_backend::*;
use genn_model::{ModelSpec, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;

/// Factory whose availability is fixed at construction
struct ProbeFactory {
    name: &'static str,
    available: bool,
}

impl BackendFactory for ProbeFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn default_preferences(&self) -> Preferences {
        Preferences::new()
    }

    fn create_backend(
        &self,
        spec: &ModelSpec,
        output_path: &Path,
        log_level: Level,
        preferences: Preferences,
    ) -> Result<Box<dyn Backend>> {
        SingleThreadedCpuFactory.create_backend(spec, output_path, log_level, preferences)
    }
}

fn registry(a_available: bool, b_available: bool) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(ProbeFactory {
        name: "A",
        available: a_available,
    }));
    registry.register(Arc::new(ProbeFactory {
        name: "B",
        available: b_available,
    }));
    registry
}

#[test]
fn test_first_available_backend_wins() {
    let decision = registry(true, true).select(None).unwrap();
    assert_eq!(decision.factory.name(), "A");
}

#[test]
fn test_falls_through_to_available_backend() {
    let decision = registry(false, true).select(None).unwrap();
    assert_eq!(decision.factory.name(), "B");
}

#[test]
fn test_no_available_backend_is_configuration_error() {
    let err = registry(false, false).select(None).unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_explicit_backend_lookup() {
    let registry = registry(true, true);
    assert_eq!(registry.select(Some("B")).unwrap().factory.name(), "B");

    let unknown = registry.select(Some("cuda")).unwrap_err();
    assert!(unknown.is_not_found());
    assert_eq!(unknown.not_found_context(), Some("backend"));
}

#[test]
fn test_explicit_unavailable_backend_not_found() {
    let err = registry(false, true).select(Some("A")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_default_registry_has_reference_backend() {
    let registry = BackendRegistry::with_defaults();
    assert_eq!(registry.names(), vec!["single_threaded_cpu"]);
    assert_eq!(
        registry.select(None).unwrap().factory.name(),
        "single_threaded_cpu"
    );
}
