// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by every GeNN crate.
//!
//! Errors are raised synchronously to the immediate caller. Nothing in the
//! description, backend or lifecycle layers retries internally.

use thiserror::Error;

/// GeNN errors
#[derive(Error, Debug)]
pub enum GennError {
    /// Operation attempted in the wrong lifecycle phase
    #[error("Invalid state: {0}")]
    State(String),

    /// Referenced population, variable or backend does not exist
    #[error("'{context}' {kind} '{name}' not found")]
    NotFound {
        kind: String,
        name: String,
        context: String,
    },

    /// Name already registered within one population kind
    #[error("Already exists: {kind} '{name}'")]
    AlreadyExists { kind: String, name: String },

    /// Host configuration problem (recording, precision, backend availability)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Structurally invalid model description
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Code generator or compiler exited unsuccessfully
    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// Compiled-artifact runtime failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl GennError {
    pub fn state(msg: impl Into<String>) -> Self {
        GennError::State(msg.into())
    }

    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        GennError::NotFound {
            kind: kind.into(),
            name: name.into(),
            context: context.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        GennError::Configuration(msg.into())
    }

    pub fn invalid_model(msg: impl Into<String>) -> Self {
        GennError::InvalidModel(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        GennError::Runtime(msg.into())
    }

    pub fn external_tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        GennError::ExternalTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn is_state_error(&self) -> bool {
        matches!(self, GennError::State(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GennError::NotFound { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, GennError::Configuration(_))
    }

    /// Role the missing entity was requested in, for `NotFound` errors
    pub fn not_found_context(&self) -> Option<&str> {
        match self {
            GennError::NotFound { context, .. } => Some(context.as_str()),
            _ => None,
        }
    }
}

/// Result type for GeNN operations
pub type Result<T> = std::result::Result<T, GennError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_role() {
        let err = GennError::not_found("neuron group", "Exc", "source");
        assert_eq!(err.to_string(), "'source' neuron group 'Exc' not found");
        assert_eq!(err.not_found_context(), Some("source"));
        assert!(err.is_not_found());
        assert!(!err.is_state_error());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GennError = io.into();
        assert!(matches!(err, GennError::Io(_)));
    }
}
