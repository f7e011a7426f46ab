// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-kind population registry

use crate::error::{GennError, Result};
use crate::population::{Population, PopulationKind};
use ahash::AHashMap;
use tracing::debug;

/// Registry holding the populations of one kind
///
/// Keeps registration order (which is also the load and teardown order)
/// alongside a name index. Names are unique within one registry only.
#[derive(Debug, Clone)]
pub struct PopulationRegistry<T> {
    kind: PopulationKind,
    /// Registered populations in insertion order
    items: Vec<T>,
    /// name -> position in `items`
    index: AHashMap<String, usize>,
}

impl<T: Population> PopulationRegistry<T> {
    pub fn new(kind: PopulationKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            index: AHashMap::new(),
        }
    }

    pub fn kind(&self) -> PopulationKind {
        self.kind
    }

    /// Insert a population, rejecting duplicate names
    pub fn insert(&mut self, population: T) -> Result<()> {
        let name = population.name().to_string();
        if self.index.contains_key(&name) {
            return Err(GennError::AlreadyExists {
                kind: self.kind.to_string(),
                name,
            });
        }

        self.index.insert(name.clone(), self.items.len());
        self.items.push(population);
        debug!(
            target: "genn_model",
            "Registered {} '{}' ({} total)",
            self.kind,
            name,
            self.items.len()
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    /// Look up a population, failing with `NotFound` in the given role
    pub fn require(&self, name: &str, context: &str) -> Result<&T> {
        self.get(name)
            .ok_or_else(|| GennError::not_found(self.kind.as_str(), name, context))
    }

    pub fn require_mut(&mut self, name: &str, context: &str) -> Result<&mut T> {
        let kind = self.kind;
        self.get_mut(name)
            .ok_or_else(|| GennError::not_found(kind.as_str(), name, context))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T: Population> IntoIterator for &'a PopulationRegistry<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
