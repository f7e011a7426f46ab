// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-genn-backend` or `--debug-all`.

use std::collections::BTreeSet;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

/// Crates whose logging is raised to `debug`
///
/// # Example
/// ```rust
/// use genn_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(["--debug-genn-backend".to_string()]);
/// assert!(flags.is_enabled("genn-backend"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate-name}` and `--debug-all` from arguments
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }
        flags
    }

    /// Parse the `GENN_DEBUG` value: `all` or comma-separated crate names
    pub fn from_env_value(value: &str) -> Self {
        let mut flags = CrateDebugFlags::default();
        flags.merge_env_value(value);
        flags
    }

    fn merge_env_value(&mut self, value: &str) {
        if value.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            self.enable(crate_name);
        }
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string());
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn enabled_crates(&self) -> impl Iterator<Item = &str> {
        self.enabled_crates.iter().map(String::as_str)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `tracing` targets of the enabled crates
    pub fn targets(&self) -> Vec<String> {
        self.enabled_crates.iter().map(|c| crate_target(c)).collect()
    }
}

/// Debug flags from the command line merged with `GENN_DEBUG`
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("GENN_DEBUG") {
        flags.merge_env_value(&value);
    }
    flags
}

/// Help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  GENN_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  GENN_DEBUG=all                              Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-genn-backend".to_string()]);
        assert!(flags.is_enabled("genn-backend"));
        assert!(!flags.is_enabled("genn-lifecycle"));
        assert_eq!(flags.targets(), vec!["genn_backend".to_string()]);
    }

    #[test]
    fn test_unrelated_args_ignored() {
        let flags = CrateDebugFlags::from_args(vec![
            "simulate".to_string(),
            "--steps=100".to_string(),
        ]);
        assert!(!flags.any_enabled());
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_env_value() {
        let flags = CrateDebugFlags::from_env_value(" genn-model, ,genn-config ");
        assert_eq!(
            flags.enabled_crates().collect::<Vec<_>>(),
            vec!["genn-config", "genn-model"]
        );
        assert_eq!(CrateDebugFlags::from_env_value("all").enabled_crates().count(), KNOWN_CRATES.len());
    }

    #[test]
    fn test_help_lists_crates() {
        let help = debug_flags_help();
        assert!(help.contains("genn-lifecycle"));
        assert!(help.contains("GENN_DEBUG"));
    }
}
