// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # genn-observability
//!
//! Logging initialisation shared by the GeNN crates.
//!
//! Three log levels are carried per model: one for the lifecycle layer, one
//! for code generation and one for the backend. They map onto `tracing`
//! targets, and per-crate debug flags raise individual crates to `debug`.
//!
//! ## Features
//! - `file-logging`: per-run log directories with per-crate files

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known GeNN crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "genn-model",
    "genn-backend",
    "genn-lifecycle",
    "genn-config",
];

/// Target of deprecation warnings
pub const DEPRECATION_TARGET: &str = "genn::deprecation";

/// Target of code generation logging
pub const CODEGEN_TARGET: &str = "genn_backend::codegen";

/// `tracing` target for a crate name (`genn-backend` -> `genn_backend`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_target() {
        assert_eq!(crate_target("genn-lifecycle"), "genn_lifecycle");
        assert!(CODEGEN_TARGET.starts_with(&crate_target("genn-backend")));
    }
}
