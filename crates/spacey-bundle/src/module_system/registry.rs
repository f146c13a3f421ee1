// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry
//!
//! The registry owns module factories and the record table. Instantiation is
//! re-entrant: a body importing a module that is still running gets the
//! in-flight record and its partially filled exports.

use super::cache::ModuleCache;
use super::context::ModuleContext;
use super::import::{import_as_namespace, import_raw};
use super::{Module, ModuleId};
use crate::config::RuntimeConfig;
use crate::error::{BundleError, Result};
use crate::lookup::ContextEntry;
use crate::runtime::{Promise, Scheduler};
use crate::value::Value;
use dashmap::DashMap;
use std::sync::Arc;

/// Body of a module, run once per record
pub type ModuleFactory = Arc<dyn Fn(&ModuleContext) -> Result<()> + Send + Sync>;

/// Operations the import bridge needs from whoever owns module records
pub trait ModuleRegistry: Send + Sync {
    /// Record for `id`, instantiating it on first request
    ///
    /// Repeated calls return the same record. A body failure is stored on
    /// the record rather than returned.
    fn get_or_instantiate(&self, id: &str, parent: Option<&Module>) -> Result<Module>;

    /// Exports behind one entry of a context map
    fn lookup_context_entry(&self, entry: &ContextEntry, parent: Option<&Module>) -> Result<Value>;
}

struct RegistryInner {
    factories: DashMap<ModuleId, ModuleFactory>,
    cache: ModuleCache,
    scheduler: Scheduler,
    config: Arc<RuntimeConfig>,
}

/// In-memory registry of module factories
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                factories: DashMap::new(),
                cache: ModuleCache::new(),
                scheduler: Scheduler::new(),
                config: Arc::new(config),
            }),
        }
    }

    /// Register the body for `id`, replacing any earlier one
    pub fn register<F>(&self, id: impl Into<ModuleId>, factory: F)
    where
        F: Fn(&ModuleContext) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.factories.insert(id.into(), Arc::new(factory));
    }

    /// Whether a body is registered for `id`
    pub fn has_factory(&self, id: &str) -> bool {
        self.inner.factories.contains_key(id)
    }

    /// Scheduler shared by every module of this registry
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Record table
    pub fn cache(&self) -> &ModuleCache {
        &self.inner.cache
    }

    /// Existing record for `id`, without instantiating
    pub fn get(&self, id: &str) -> Option<Module> {
        self.inner.cache.get(id)
    }

    /// Import `id` as an ES module from outside any module
    pub fn import(&self, id: &str) -> Result<Value> {
        import_as_namespace(self, None, id)
    }

    /// Require `id` from outside any module
    pub fn require(&self, id: &str) -> Result<Value> {
        import_raw(self, None, id)
    }

    /// Import `id` as a promise
    ///
    /// Async modules settle the promise with their final exports snapshot.
    pub fn dynamic_import(&self, id: &str) -> Promise {
        settle_import(&self.inner.scheduler, self.import(id))
    }

    fn instantiate(&self, module: &Module, factory: &ModuleFactory) {
        tracing::debug!(module = %module.id(), "instantiating module");
        let ctx = ModuleContext::new(
            module.clone(),
            Arc::new(self.clone()),
            self.inner.scheduler.clone(),
            Arc::clone(&self.inner.config),
        );

        if let Err(err) = factory(&ctx) {
            let err = match err {
                err @ BundleError::Instantiation { .. } => err,
                err => BundleError::instantiation(module.id(), err),
            };
            tracing::debug!(module = %module.id(), error = %err, "module failed");
            module.set_error(err);
        }
        module.mark_loaded();
    }
}

impl ModuleRegistry for Registry {
    fn get_or_instantiate(&self, id: &str, parent: Option<&Module>) -> Result<Module> {
        if let Some(module) = self.inner.cache.get(id) {
            link(parent, &module);
            return Ok(module);
        }

        let factory = self
            .inner
            .factories
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BundleError::FactoryNotAvailable {
                id: id.to_string(),
                parent: parent.map_or_else(|| "runtime".to_string(), |p| p.id().to_string()),
            })?;

        let (module, created) = self.inner.cache.get_or_create(id);
        link(parent, &module);
        if created {
            self.instantiate(&module, &factory);
        }
        Ok(module)
    }

    fn lookup_context_entry(&self, entry: &ContextEntry, parent: Option<&Module>) -> Result<Value> {
        import_raw(self, parent, &entry.id)
    }
}

fn link(parent: Option<&Module>, module: &Module) {
    if let Some(parent) = parent {
        parent.add_child(module.id());
        module.add_parent(parent.id());
    }
}

pub(crate) fn settle_import(scheduler: &Scheduler, result: Result<Value>) -> Promise {
    match result {
        Ok(value) => Promise::resolved(scheduler, value),
        Err(err) => Promise::rejected(scheduler, err),
    }
}
