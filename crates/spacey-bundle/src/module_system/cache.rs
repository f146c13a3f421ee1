// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Record table keyed by module id

use super::{Module, ModuleId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Thread-safe module record table
///
/// Holds at most one record per id. Records are inserted before their body
/// runs, so a re-entrant request for the same id finds the in-flight record.
pub struct ModuleCache {
    cache: DashMap<ModuleId, Module>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Option<Module> {
        self.cache.get(id).map(|entry| entry.clone())
    }

    /// Check if a record exists
    pub fn has(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    /// Return the record for `id`, creating it if absent
    ///
    /// The flag is true when this call created the record.
    pub fn get_or_create(&self, id: &str) -> (Module, bool) {
        match self.cache.entry(id.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let module = Module::new(id);
                entry.insert(module.clone());
                (module, true)
            }
        }
    }

    /// Get all cached module ids
    pub fn keys(&self) -> Vec<ModuleId> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of cached records
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}
