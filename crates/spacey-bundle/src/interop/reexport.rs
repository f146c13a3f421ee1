// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Read-through view over a module's exports and its re-export sources

use crate::value::{ES_MODULE_KEY, ObjectRef, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::sync::Arc;

struct ReexportInner {
    target: ObjectRef,
    sources: RwLock<Vec<Value>>,
}

/// Target object plus an ordered list of re-export sources
///
/// Reads resolve against the target's own properties, then `default` and
/// `__esModule` on the target, then each source in registration order. The
/// first source yielding something other than `undefined` wins.
#[derive(Clone)]
pub struct ReexportView {
    inner: Arc<ReexportInner>,
}

impl ReexportView {
    /// Create a view with no sources yet
    pub fn new(target: ObjectRef) -> Self {
        Self {
            inner: Arc::new(ReexportInner {
                target,
                sources: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The object local exports live on
    pub fn target(&self) -> &ObjectRef {
        &self.inner.target
    }

    /// Append a source after all existing ones
    pub fn push_source(&self, source: Value) {
        self.inner.sources.write().push(source);
    }

    /// Registered sources in registration order
    pub fn sources(&self) -> Vec<Value> {
        self.inner.sources.read().clone()
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.inner.sources.read().len()
    }

    /// Whether no source has been registered
    pub fn is_empty(&self) -> bool {
        self.inner.sources.read().is_empty()
    }

    /// Resolve `key` by precedence
    pub fn get(&self, key: &str) -> Value {
        let target = &self.inner.target;
        if target.has_own(key) || key == "default" || key == ES_MODULE_KEY {
            return target.get(key);
        }
        for source in self.sources() {
            let value = source.get(key);
            if !value.is_undefined() {
                return value;
            }
        }
        Value::Undefined
    }

    /// Target keys followed by every source's keys except `default`
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = self.inner.target.own_keys();
        let mut seen: FxHashSet<String> = keys.iter().cloned().collect();
        for source in self.sources() {
            for key in source.own_keys() {
                if key != "default" && seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Property;

    fn view_with(target: ObjectRef, sources: Vec<ObjectRef>) -> ReexportView {
        let view = ReexportView::new(target);
        for source in sources {
            view.push_source(Value::Object(source));
        }
        view
    }

    #[test]
    fn test_local_keys_win() {
        let target = ObjectRef::from_entries([("x", "local")]);
        let view = view_with(target, vec![ObjectRef::from_entries([("x", "r1")])]);
        assert_eq!(view.get("x"), Value::from("local"));
    }

    #[test]
    fn test_sources_checked_in_order() {
        let r1 = ObjectRef::from_entries([("a", "r1")]);
        let r2 = ObjectRef::from_entries([("a", "r2"), ("b", "r2")]);
        let view = view_with(ObjectRef::new(), vec![r1, r2]);

        assert_eq!(view.get("a"), Value::from("r1"));
        assert_eq!(view.get("b"), Value::from("r2"));
        assert_eq!(view.get("c"), Value::Undefined);
    }

    #[test]
    fn test_undefined_source_value_falls_through() {
        let r1 = ObjectRef::from_entries([("a", Value::Undefined)]);
        let r2 = ObjectRef::from_entries([("a", 2)]);
        let view = view_with(ObjectRef::new(), vec![r1, r2]);
        assert_eq!(view.get("a"), Value::Number(2.0));
    }

    #[test]
    fn test_default_never_read_from_sources() {
        let r1 = ObjectRef::from_entries([("default", "r1")]);
        let view = view_with(ObjectRef::with_prototype(None), vec![r1]);
        assert_eq!(view.get("default"), Value::Undefined);
        assert_eq!(view.get(ES_MODULE_KEY), Value::Undefined);
    }

    #[test]
    fn test_keys_deduplicated_in_discovery_order() {
        let target = ObjectRef::new();
        target.define_property("local", Property::data(1));
        let r1 = ObjectRef::from_entries([("a", 1), ("default", 0), ("local", 9)]);
        let r2 = ObjectRef::from_entries([("b", 2), ("a", 3)]);
        let view = view_with(target, vec![r1, r2]);

        assert_eq!(view.own_keys(), vec!["local", "a", "b"]);
    }

    #[test]
    fn test_enumeration_is_live() {
        let r1 = ObjectRef::new();
        let view = view_with(ObjectRef::new(), vec![r1.clone()]);
        assert!(view.own_keys().is_empty());

        r1.set("late", 1);
        assert_eq!(view.own_keys(), vec!["late"]);
        assert_eq!(view.get("late"), Value::Number(1.0));
    }
}
