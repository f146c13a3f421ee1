// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records

use crate::async_module::AsyncExports;
use crate::error::{BundleError, Result};
use crate::interop::reexport::ReexportView;
use crate::value::{ObjectRef, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Module identifier as emitted by the bundler
pub type ModuleId = String;

struct ModuleState {
    exports: Value,
    namespace_object: Option<Value>,
    error: Option<BundleError>,
    loaded: bool,
    children: Vec<ModuleId>,
    parents: Vec<ModuleId>,
    reexports: Option<ReexportView>,
    async_exports: Option<AsyncExports>,
}

struct ModuleInner {
    id: ModuleId,
    state: RwLock<ModuleState>,
}

/// One instantiated module
///
/// Cloning shares the record.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    /// Create a record with an empty exports object
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                id: id.into(),
                state: RwLock::new(ModuleState {
                    exports: Value::Object(ObjectRef::new()),
                    namespace_object: None,
                    error: None,
                    loaded: false,
                    children: Vec::new(),
                    parents: Vec::new(),
                    reexports: None,
                    async_exports: None,
                }),
            }),
        }
    }

    /// Module id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// What importers see as `module.exports`
    ///
    /// For an async module this is its export handle.
    pub fn exports(&self) -> Value {
        let state = self.inner.state.read();
        match &state.async_exports {
            Some(handle) => Value::AsyncModule(handle.clone()),
            None => state.exports.clone(),
        }
    }

    /// Replace `module.exports`
    ///
    /// On an async module the handle stays in place and its snapshot is
    /// replaced instead.
    pub fn set_exports(&self, exports: Value) {
        let handle = {
            let mut state = self.inner.state.write();
            match &state.async_exports {
                Some(handle) => handle.clone(),
                None => {
                    state.exports = exports;
                    return;
                }
            }
        };
        if let Value::AsyncModule(other) = &exports {
            if other.ptr_eq(&handle) {
                return;
            }
        }
        handle.set_exports(exports);
    }

    /// The object named exports get attached to
    pub fn exports_object(&self) -> Result<ObjectRef> {
        let exports = {
            let state = self.inner.state.read();
            match &state.async_exports {
                Some(handle) => handle.exports(),
                None => state.exports.clone(),
            }
        };
        match exports {
            Value::Object(obj) => Ok(obj),
            other => Err(BundleError::type_error(format!(
                "exports of module '{}' is not an object ({})",
                self.inner.id,
                other.type_of()
            ))),
        }
    }

    /// Cached namespace view
    ///
    /// For an async module this is its export handle.
    pub fn namespace_object(&self) -> Option<Value> {
        let state = self.inner.state.read();
        match &state.async_exports {
            Some(handle) => Some(Value::AsyncModule(handle.clone())),
            None => state.namespace_object.clone(),
        }
    }

    /// Cache a namespace view, unless one is already cached
    ///
    /// Returns the namespace that ends up cached.
    pub fn set_namespace_object(&self, namespace: Value) -> Value {
        let mut state = self.inner.state.write();
        if let Some(handle) = &state.async_exports {
            return Value::AsyncModule(handle.clone());
        }
        match &state.namespace_object {
            Some(existing) => {
                if *existing != namespace {
                    tracing::trace!(module = %self.inner.id, "keeping existing namespace object");
                }
                existing.clone()
            }
            None => {
                state.namespace_object = Some(namespace.clone());
                namespace
            }
        }
    }

    /// Stored instantiation failure
    pub fn error(&self) -> Option<BundleError> {
        self.inner.state.read().error.clone()
    }

    /// Record a failure; the first one sticks
    pub fn set_error(&self, error: BundleError) {
        let mut state = self.inner.state.write();
        if state.error.is_none() {
            state.error = Some(error);
        }
    }

    /// Whether the body has finished running
    pub fn is_loaded(&self) -> bool {
        self.inner.state.read().loaded
    }

    /// Mark the body as finished
    pub fn mark_loaded(&self) {
        self.inner.state.write().loaded = true;
    }

    /// Ids of modules this one imported
    pub fn children(&self) -> Vec<ModuleId> {
        self.inner.state.read().children.clone()
    }

    /// Ids of modules that imported this one
    pub fn parents(&self) -> Vec<ModuleId> {
        self.inner.state.read().parents.clone()
    }

    pub(crate) fn add_child(&self, id: &str) {
        let mut state = self.inner.state.write();
        if !state.children.iter().any(|c| c == id) {
            state.children.push(id.to_string());
        }
    }

    pub(crate) fn add_parent(&self, id: &str) {
        let mut state = self.inner.state.write();
        if !state.parents.iter().any(|p| p == id) {
            state.parents.push(id.to_string());
        }
    }

    /// Re-export sources, once a dynamic re-export happened
    pub fn reexports(&self) -> Option<ReexportView> {
        self.inner.state.read().reexports.clone()
    }

    /// Swap exports and namespace for a re-export composite
    pub(crate) fn install_reexports(&self, view: ReexportView, composite: ObjectRef) {
        let handle = {
            let mut state = self.inner.state.write();
            state.reexports = Some(view);
            match &state.async_exports {
                Some(handle) => handle.clone(),
                None => {
                    state.exports = Value::Object(composite.clone());
                    state.namespace_object = Some(Value::Object(composite));
                    return;
                }
            }
        };
        handle.set_exports(Value::Object(composite));
    }

    /// Export handle, if the module is asynchronous
    pub fn async_exports(&self) -> Option<AsyncExports> {
        self.inner.state.read().async_exports.clone()
    }

    pub(crate) fn attach_async(&self, handle: AsyncExports) {
        self.inner.state.write().async_exports = Some(handle);
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Module")
            .field("id", &self.inner.id)
            .field("loaded", &state.loaded)
            .field("error", &state.error)
            .field("async", &state.async_exports.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Scheduler;

    #[test]
    fn test_namespace_is_memoized() {
        let module = Module::new("m");
        let first = Value::from(ObjectRef::new());
        let second = Value::from(ObjectRef::new());

        assert_eq!(module.set_namespace_object(first.clone()), first);
        assert_eq!(module.set_namespace_object(second), first);
        assert_eq!(module.namespace_object(), Some(first));
    }

    #[test]
    fn test_first_error_sticks() {
        let module = Module::new("m");
        module.set_error(BundleError::generic("first"));
        module.set_error(BundleError::generic("second"));
        assert_eq!(module.error().unwrap().to_string(), "first");
    }

    #[test]
    fn test_edges_deduplicated() {
        let module = Module::new("m");
        module.add_child("a");
        module.add_child("a");
        module.add_parent("p");
        assert_eq!(module.children(), vec!["a"]);
        assert_eq!(module.parents(), vec!["p"]);
    }

    #[test]
    fn test_exports_object_rejects_primitives() {
        let module = Module::new("m");
        module.set_exports(Value::from(5));
        assert!(matches!(module.exports_object(), Err(BundleError::TypeError(_))));
    }

    #[test]
    fn test_async_module_exports_are_handle() {
        let scheduler = Scheduler::new();
        let module = Module::new("m");
        let original = module.exports();
        let handle = AsyncExports::new("m".into(), &scheduler, original.clone(), None);
        module.attach_async(handle.clone());

        assert_eq!(module.exports(), Value::AsyncModule(handle.clone()));
        assert_eq!(module.namespace_object(), Some(Value::AsyncModule(handle.clone())));
        assert!(module.exports_object().unwrap().ptr_eq(original.as_object().unwrap()));

        let replacement = Value::from(ObjectRef::new());
        module.set_exports(replacement.clone());
        assert_eq!(handle.exports(), replacement);
    }
}
