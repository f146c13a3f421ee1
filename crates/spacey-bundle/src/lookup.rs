// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Named lookups and context maps
//!
//! Both fail with [`BundleError::ModuleNotFound`], whose code is
//! `MODULE_NOT_FOUND`.

use crate::error::{BundleError, Result};
use crate::module_system::{Module, ModuleId, ModuleRegistry};
use crate::runtime::{Promise, Scheduler};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Producer registered under a name
pub type LookupFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Name to producer mapping
pub type LookupMap = FxHashMap<String, LookupFn>;

/// Call the producer registered as `name`
///
/// On a miss, `as_promise` turns the failure into a promise that rejects on
/// the next scheduler turn instead of an immediate error. A hit returns the
/// producer's result unchanged in either mode.
pub fn lookup_by_name(
    scheduler: &Scheduler,
    map: &LookupMap,
    name: &str,
    as_promise: bool,
) -> Result<Value> {
    if let Some(producer) = map.get(name) {
        return producer();
    }

    let err = BundleError::module_not_found(name);
    if !as_promise {
        return Err(err);
    }

    let promise = Promise::new(scheduler);
    let target = promise.clone();
    scheduler.queue_job(move || target.reject(err));
    Ok(Value::Promise(promise))
}

/// One entry of a context map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    /// Module the entry resolves to
    pub id: ModuleId,
}

impl ContextEntry {
    /// Entry resolving to module `id`
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self { id: id.into() }
    }
}

/// Enumerable view over a fixed request-to-module mapping
pub struct ContextMap {
    keys: Vec<String>,
    entries: FxHashMap<String, ContextEntry>,
    registry: Arc<dyn ModuleRegistry>,
    parent: Option<Module>,
    scheduler: Scheduler,
}

impl ContextMap {
    /// Create a map; later duplicates of a key replace earlier ones
    pub fn new<I, K>(
        entries: I,
        registry: Arc<dyn ModuleRegistry>,
        parent: Option<Module>,
        scheduler: Scheduler,
    ) -> Self
    where
        I: IntoIterator<Item = (K, ContextEntry)>,
        K: Into<String>,
    {
        let mut keys = Vec::new();
        let mut map = FxHashMap::default();
        for (key, entry) in entries {
            let key = key.into();
            if map.insert(key.clone(), entry).is_none() {
                keys.push(key);
            }
        }
        Self {
            keys,
            entries: map,
            registry,
            parent,
            scheduler,
        }
    }

    /// Request strings in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn entry(&self, id: &str) -> Result<&ContextEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| BundleError::module_not_found(id))
    }

    /// Module id a request maps to
    pub fn resolve(&self, id: &str) -> Result<ModuleId> {
        self.entry(id).map(|entry| entry.id.clone())
    }

    /// Exports of the module a request maps to
    pub fn require(&self, id: &str) -> Result<Value> {
        let entry = self.entry(id)?;
        self.registry.lookup_context_entry(entry, self.parent.as_ref())
    }

    /// Like [`ContextMap::require`], as a promise
    pub fn import(&self, id: &str) -> Promise {
        match self.require(id) {
            Ok(value) => Promise::resolved(&self.scheduler, value),
            Err(err) => Promise::rejected(&self.scheduler, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MODULE_NOT_FOUND;

    fn map() -> LookupMap {
        let mut map = LookupMap::default();
        map.insert("a".to_string(), Arc::new(|| -> Result<Value> { Ok(Value::from(1)) }));
        map
    }

    #[test]
    fn test_lookup_hit() {
        let scheduler = Scheduler::new();
        assert_eq!(lookup_by_name(&scheduler, &map(), "a", false).unwrap(), Value::Number(1.0));
        assert_eq!(lookup_by_name(&scheduler, &map(), "a", true).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_lookup_miss_raises() {
        let scheduler = Scheduler::new();
        let err = lookup_by_name(&scheduler, &LookupMap::default(), "missing", false).unwrap_err();
        assert_eq!(err.code(), Some(MODULE_NOT_FOUND));
    }

    #[test]
    fn test_lookup_miss_as_promise_rejects_next_turn() {
        let scheduler = Scheduler::new();
        let value = lookup_by_name(&scheduler, &LookupMap::default(), "missing", true).unwrap();
        let Value::Promise(promise) = value else {
            panic!("expected a promise");
        };
        let code = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&code);
        promise.catch(move |err| {
            *slot.lock() = err.code();
            Ok(Value::Undefined)
        });

        assert!(promise.is_pending());
        scheduler.run_until_idle();
        assert!(promise.is_rejected());
        assert_eq!(*code.lock(), Some(MODULE_NOT_FOUND));
        assert!(scheduler.check_unhandled_rejections().is_empty());
    }
}
