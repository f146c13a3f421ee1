// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS / ES module export interop
//!
//! Two export shapes meet here. CommonJS bodies hand back a plain mutable
//! object; ES module bodies declare named bindings that must stay live. Both
//! end up as a namespace object whose properties are getters over the real
//! storage, marked with `__esModule` and sealed once declared.

pub mod reexport;

use crate::error::Result;
use crate::module_system::Module;
use crate::value::{
    ES_MODULE_KEY, Getter, ObjectRef, Property, Setter, Value, is_base_prototype,
};
use reexport::ReexportView;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One named export declared by a module body
#[derive(Clone)]
pub enum ExportBinding {
    /// Read-only live binding
    Getter(Getter),
    /// Live binding importers may also write through
    GetterSetter(Getter, Setter),
}

impl ExportBinding {
    /// Read-only binding backed by `get`
    pub fn getter<F>(get: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Getter(Arc::new(get))
    }

    /// Writable binding backed by `get` and `set`
    pub fn accessor<G, S>(get: G, set: S) -> Self
    where
        G: Fn() -> Value + Send + Sync + 'static,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self::GetterSetter(Arc::new(get), Arc::new(set))
    }

    fn into_property(self) -> Property {
        match self {
            Self::Getter(get) => Property::getter(get),
            Self::GetterSetter(get, set) => Property::accessor(get, set),
        }
    }
}

/// Attach getter-backed named exports to `exports`
///
/// Marks the object with `__esModule` and seals it. A property that already
/// exists is left untouched.
pub fn declare_named_exports<I, K>(exports: &ObjectRef, getters: I)
where
    I: IntoIterator<Item = (K, ExportBinding)>,
    K: Into<String>,
{
    exports.define_if_absent(ES_MODULE_KEY, Property::hidden(true));
    for (key, binding) in getters {
        let key = key.into();
        if exports.define_if_absent(key.clone(), binding.into_property()) {
            tracing::trace!(export = %key, "declared named export");
        }
    }
    exports.seal();
}

/// Publish a module's own exports object as its namespace
///
/// A namespace cached by an earlier import (a cycle reaching the module
/// before this call) is kept; importers holding it only see `default`.
pub fn publish_as_esm<I, K>(module: &Module, getters: I) -> Result<()>
where
    I: IntoIterator<Item = (K, ExportBinding)>,
    K: Into<String>,
{
    let exports = module.exports_object()?;
    let own = module.exports();
    let namespace = module.set_namespace_object(own.clone());
    if namespace != own {
        tracing::warn!(
            module = %module.id(),
            "module was imported before declaring its exports; named exports are hidden from that namespace"
        );
    }
    declare_named_exports(&exports, getters);
    Ok(())
}

/// Build a namespace object over a raw export value
///
/// Own property names are collected from every level of `raw`'s prototype
/// chain down to, but excluding, the shared base prototypes. `default` reads
/// `raw` itself unless `allow_raw_default` is set and a collected name is
/// already `default`.
pub fn interop_raw(raw: &Value, allow_raw_default: bool) -> Value {
    let mut names: Vec<String> = Vec::new();
    let mut getters: FxHashMap<String, Getter> = FxHashMap::default();

    let mut current = raw.as_object().cloned();
    while let Some(obj) = current {
        if is_base_prototype(&obj) {
            break;
        }
        for key in obj.own_keys() {
            if getters.contains_key(&key) {
                continue;
            }
            let source = raw.clone();
            let name = key.clone();
            getters.insert(key.clone(), Arc::new(move || source.get(&name)));
            names.push(key);
        }
        current = obj.prototype();
    }

    if !(allow_raw_default && getters.contains_key("default")) {
        let source = raw.clone();
        if getters
            .insert("default".to_string(), Arc::new(move || source.clone()))
            .is_none()
        {
            names.push("default".to_string());
        }
    }

    let namespace = if raw.is_callable() {
        let callee = raw.clone();
        ObjectRef::function(move |args| callee.call(args))
    } else {
        ObjectRef::with_prototype(None)
    };

    tracing::trace!(exports = names.len(), "built interop namespace");
    declare_named_exports(
        &namespace,
        names.into_iter().filter_map(|name| {
            let get = getters.remove(&name)?;
            Some((name, ExportBinding::Getter(get)))
        }),
    );
    Value::Object(namespace)
}

/// Forward every export of `source` through `module`
///
/// The first call swaps the module's exports (and namespace) for a
/// read-through composite over the current exports object; later calls only
/// append to its source list.
pub fn dynamic_export(module: &Module, source: Value) -> Result<()> {
    let view = match module.reexports() {
        Some(view) => view,
        None => {
            let view = ReexportView::new(module.exports_object()?);
            module.install_reexports(view.clone(), ObjectRef::reexports(view.clone()));
            view
        }
    };
    view.push_source(source);
    tracing::trace!(module = %module.id(), sources = view.len(), "added re-export source");
    Ok(())
}
