// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle phases of a GeNN model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model lifecycle state
///
/// Transitions only move forward: `Unbuilt -> Built -> Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LifecycleState {
    Unbuilt = 0,
    Built = 1,
    Loaded = 2,
}

impl LifecycleState {
    pub fn is_built(self) -> bool {
        self >= LifecycleState::Built
    }

    pub fn is_loaded(self) -> bool {
        self == LifecycleState::Loaded
    }
}

impl PartialOrd for LifecycleState {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LifecycleState {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Unbuilt => "unbuilt",
            LifecycleState::Built => "built",
            LifecycleState::Loaded => "loaded",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(LifecycleState::Unbuilt < LifecycleState::Built);
        assert!(LifecycleState::Built < LifecycleState::Loaded);
        assert!(LifecycleState::Loaded.is_built());
        assert!(!LifecycleState::Unbuilt.is_built());
        assert!(!LifecycleState::Built.is_loaded());
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Unbuilt.to_string(), "unbuilt");
        assert_eq!(LifecycleState::Loaded.to_string(), "loaded");
    }
}
