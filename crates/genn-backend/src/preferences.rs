// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Backend preference objects
//!
//! Every backend publishes a flat set of named preferences with defaults.
//! Callers supply overrides as a name→value mapping; only names the backend
//! recognises are applied.

use genn_model::{GennError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Value of a single backend preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PreferenceValue {
    fn type_name(&self) -> &'static str {
        match self {
            PreferenceValue::Bool(_) => "bool",
            PreferenceValue::Int(_) => "int",
            PreferenceValue::Float(_) => "float",
            PreferenceValue::Str(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PreferenceValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PreferenceValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PreferenceValue::Float(f) => Some(*f),
            PreferenceValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PreferenceValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::Bool(b) => write!(f, "{}", b),
            PreferenceValue::Int(i) => write!(f, "{}", i),
            PreferenceValue::Float(v) => write!(f, "{}", v),
            PreferenceValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for PreferenceValue {
    fn from(v: bool) -> Self {
        PreferenceValue::Bool(v)
    }
}

impl From<i64> for PreferenceValue {
    fn from(v: i64) -> Self {
        PreferenceValue::Int(v)
    }
}

impl From<f64> for PreferenceValue {
    fn from(v: f64) -> Self {
        PreferenceValue::Float(v)
    }
}

impl From<&str> for PreferenceValue {
    fn from(v: &str) -> Self {
        PreferenceValue::Str(v.to_string())
    }
}

impl From<String> for PreferenceValue {
    fn from(v: String) -> Self {
        PreferenceValue::Str(v)
    }
}

/// Named preferences of one backend, with their current values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    values: BTreeMap<String, PreferenceValue>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a recognised preference with its default
    pub fn with(mut self, name: &str, default: impl Into<PreferenceValue>) -> Self {
        self.values.insert(name.to_string(), default.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&PreferenceValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PreferenceValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PreferenceValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PreferenceValue::as_float)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PreferenceValue::as_str)
    }

    pub fn is_recognised(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreferenceValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply caller overrides.
    ///
    /// Unrecognised names are ignored. Integers are accepted for float
    /// preferences; any other type mismatch is a configuration error.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a PreferenceValue)>,
    {
        for (name, value) in overrides {
            let Some(current) = self.values.get_mut(name) else {
                debug!(target: "genn_backend", "Ignoring unrecognised backend preference '{}'", name);
                continue;
            };

            let coerced = match (&*current, value) {
                (PreferenceValue::Float(_), PreferenceValue::Int(i)) => PreferenceValue::Float(*i as f64),
                (c, v) if c.type_name() == v.type_name() => v.clone(),
                (c, v) => {
                    return Err(GennError::configuration(format!(
                        "Backend preference '{}' expects a {} value, got {}",
                        name,
                        c.type_name(),
                        v
                    )));
                }
            };
            debug!(target: "genn_backend", "Backend preference '{}' = {}", name, coerced);
            *current = coerced;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Preferences {
        Preferences::new()
            .with("debug_code", false)
            .with("block_size", 32i64)
            .with("free_memory_fraction", 0.5)
    }

    #[test]
    fn test_only_recognised_overrides_apply() {
        let mut prefs = defaults();
        let overrides: BTreeMap<String, PreferenceValue> = [
            ("debug_code".to_string(), PreferenceValue::Bool(true)),
            ("no_such_option".to_string(), PreferenceValue::Int(7)),
        ]
        .into_iter()
        .collect();

        prefs
            .apply_overrides(overrides.iter().map(|(k, v)| (k.as_str(), v)))
            .unwrap();
        assert_eq!(prefs.get_bool("debug_code"), Some(true));
        assert!(!prefs.is_recognised("no_such_option"));
        assert_eq!(prefs.get_int("block_size"), Some(32));
    }

    #[test]
    fn test_int_coerces_to_float() {
        let mut prefs = defaults();
        let one = PreferenceValue::Int(1);
        prefs
            .apply_overrides([("free_memory_fraction", &one)])
            .unwrap();
        assert_eq!(prefs.get("free_memory_fraction"), Some(&PreferenceValue::Float(1.0)));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut prefs = defaults();
        let text = PreferenceValue::from("yes");
        let err = prefs.apply_overrides([("debug_code", &text)]).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
