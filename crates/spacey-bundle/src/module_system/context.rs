// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime surface handed to module bodies

use super::import::{import_as_namespace, import_raw};
use super::registry::settle_import;
use super::{Module, ModuleRegistry};
use crate::async_module::{AsyncExports, AsyncModuleContext, async_module};
use crate::chunk::{chunk_url, get_chunk_path};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::interop::{self, ExportBinding};
use crate::lookup::{ContextEntry, ContextMap, LookupMap, lookup_by_name};
use crate::relative_url::RelativeUrl;
use crate::runtime::{Promise, Scheduler};
use crate::value::Value;
use std::sync::Arc;

/// What a module body can call while it runs
#[derive(Clone)]
pub struct ModuleContext {
    module: Module,
    registry: Arc<dyn ModuleRegistry>,
    scheduler: Scheduler,
    config: Arc<RuntimeConfig>,
}

impl ModuleContext {
    /// Bind a context to `module`
    pub fn new(
        module: Module,
        registry: Arc<dyn ModuleRegistry>,
        scheduler: Scheduler,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            module,
            registry,
            scheduler,
            config,
        }
    }

    /// The module being instantiated
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Current `module.exports`
    pub fn exports(&self) -> Value {
        self.module.exports()
    }

    /// Shared scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Declare ES module exports on the module's own exports object
    ///
    /// Call this before any `import`/`require`: a cycle that imports this
    /// module first caches a namespace exposing only `default`, and that
    /// namespace is kept.
    pub fn esm_export<I, K>(&self, getters: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ExportBinding)>,
        K: Into<String>,
    {
        interop::publish_as_esm(&self.module, getters)
    }

    /// Re-export everything `source` exports (`export * from`)
    pub fn dynamic_export(&self, source: Value) -> Result<()> {
        interop::dynamic_export(&self.module, source)
    }

    /// Replace `module.exports` wholesale
    pub fn export_value(&self, value: Value) {
        self.module.set_exports(value);
    }

    /// Use `namespace` as both exports and namespace object
    pub fn export_namespace(&self, namespace: Value) {
        self.module.set_exports(namespace.clone());
        self.module.set_namespace_object(namespace);
    }

    /// Export a parsed JSON document
    pub fn export_json(&self, text: &str) -> Result<()> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        self.export_value(Value::from_json(&json));
        Ok(())
    }

    /// ESM import of `id`
    pub fn import(&self, id: &str) -> Result<Value> {
        import_as_namespace(self.registry.as_ref(), Some(&self.module), id)
    }

    /// CommonJS require of `id`
    pub fn require(&self, id: &str) -> Result<Value> {
        import_raw(self.registry.as_ref(), Some(&self.module), id)
    }

    /// `import()` of `id`; failures become rejections
    pub fn dynamic_import(&self, id: &str) -> Promise {
        settle_import(&self.scheduler, self.import(id))
    }

    /// Run `body` as an asynchronous module body
    pub fn async_module<F>(&self, has_await: bool, body: F) -> AsyncExports
    where
        F: FnOnce(&AsyncModuleContext) -> Result<()>,
    {
        async_module(&self.module, &self.scheduler, has_await, body)
    }

    /// Context map over fixed entries (`require.context`)
    pub fn context_map<I, K>(&self, entries: I) -> ContextMap
    where
        I: IntoIterator<Item = (K, ContextEntry)>,
        K: Into<String>,
    {
        ContextMap::new(
            entries,
            Arc::clone(&self.registry),
            Some(self.module.clone()),
            self.scheduler.clone(),
        )
    }

    /// Named lookup with a `MODULE_NOT_FOUND` failure
    pub fn lookup(&self, map: &LookupMap, name: &str, as_promise: bool) -> Result<Value> {
        lookup_by_name(&self.scheduler, map, name, as_promise)
    }

    /// Normalize a chunk descriptor to its path
    pub fn chunk_path(&self, data: &Value) -> Result<String> {
        get_chunk_path(data)
    }

    /// URL a chunk is served from
    pub fn chunk_url(&self, path: &str) -> String {
        chunk_url(&self.config, path)
    }

    /// Parse a URL relative to the configured base
    pub fn relative_url(&self, input: &str) -> Result<RelativeUrl> {
        RelativeUrl::parse_with_config(&self.config, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_system::Registry;

    #[test]
    fn test_export_namespace_sets_both() {
        let registry = Registry::new(RuntimeConfig::default());
        let ns = Value::from(crate::value::ObjectRef::from_entries([("x", 1)]));
        let expected = ns.clone();
        registry.register("m", move |ctx| {
            ctx.export_namespace(ns.clone());
            Ok(())
        });

        let module = registry.get_or_instantiate("m", None).unwrap();
        assert_eq!(module.exports(), expected);
        assert_eq!(registry.import("m").unwrap(), expected);
    }

    #[test]
    fn test_export_json() {
        let registry = Registry::new(RuntimeConfig::default());
        registry.register("data.json", |ctx| ctx.export_json(r#"{"name": "spacey", "tags": [1, 2]}"#));

        let data = registry.require("data.json").unwrap();
        assert_eq!(data.get("name"), Value::from("spacey"));
        assert_eq!(data.get("tags").get("1"), Value::Number(2.0));
    }

    #[test]
    fn test_invalid_json_fails_module() {
        let registry = Registry::new(RuntimeConfig::default());
        registry.register("bad.json", |ctx| ctx.export_json("{"));
        assert!(registry.require("bad.json").is_err());
    }
}
