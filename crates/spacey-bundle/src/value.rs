// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dynamic values seen by module bodies
//!
//! Export objects are shared, interior-mutable property bags with an optional
//! prototype. A property is either plain data or a getter/setter pair, which
//! is what lets a namespace object expose live bindings instead of copies.
//!
//! Three prototypes are shared by every object of their kind: the plain object
//! prototype, the array prototype and the function prototype. Interop never
//! expands them.

use crate::async_module::AsyncExports;
use crate::error::{BundleError, Result};
use crate::interop::reexport::ReexportView;
use crate::runtime::Promise;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Property marking an export object as ES module shaped
pub const ES_MODULE_KEY: &str = "__esModule";

/// Getter backing a live property
pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// Setter backing a writable live property
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// Native function callable from module code
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A runtime value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object reference (plain object, array, function or re-export view)
    Object(ObjectRef),
    /// Ordinary pending value
    Promise(Promise),
    /// Export handle of an asynchronous module
    AsyncModule(AsyncExports),
}

impl Value {
    /// Check for `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Promise(_) | Value::AsyncModule(_) => true,
        }
    }

    /// Borrow the object behind this value
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the string behind this value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The `typeof` of this value
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) if obj.is_callable() => "function",
            Value::Object(_) | Value::Promise(_) | Value::AsyncModule(_) => "object",
        }
    }

    /// Read a property; primitives and handles have none
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key),
            _ => Value::Undefined,
        }
    }

    /// Own property names (empty for anything but objects)
    pub fn own_keys(&self) -> Vec<String> {
        match self {
            Value::Object(obj) => obj.own_keys(),
            _ => Vec::new(),
        }
    }

    /// Whether this value is callable
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_callable())
    }

    /// Call this value as a function
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.call(args),
            other => Err(BundleError::type_error(format!("{} is not a function", other))),
        }
    }

    /// Convert a parsed JSON document
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                Value::Object(ObjectRef::array(arr.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN != NaN falls out of f64 comparison
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::AsyncModule(a), Value::AsyncModule(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if *n == 0.0 => write!(f, "0"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e21 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(obj) if obj.is_callable() => write!(f, "[Function]"),
            Value::Object(obj) if obj.is_array() => write!(f, "[object Array]"),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Promise(_) => write!(f, "[object Promise]"),
            Value::AsyncModule(handle) => write!(f, "[async module {}]", handle.module_id()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "Object({:?})", obj.own_keys()),
            Value::Promise(p) => write!(f, "{:?}", p),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Storage behind a property
#[derive(Clone)]
pub enum Slot {
    /// Plain value
    Data(Value),
    /// Live binding
    Accessor {
        /// Read side
        get: Getter,
        /// Write side, absent for read-only bindings
        set: Option<Setter>,
    },
}

/// An own property
#[derive(Clone)]
pub struct Property {
    /// Value or accessor pair
    pub slot: Slot,
    /// Whether the property shows up in `keys()`
    pub enumerable: bool,
}

impl Property {
    /// Enumerable data property
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data(value.into()),
            enumerable: true,
        }
    }

    /// Non-enumerable data property
    pub fn hidden(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data(value.into()),
            enumerable: false,
        }
    }

    /// Enumerable read-only getter
    pub fn getter(get: Getter) -> Self {
        Self {
            slot: Slot::Accessor { get, set: None },
            enumerable: true,
        }
    }

    /// Enumerable getter/setter pair
    pub fn accessor(get: Getter, set: Setter) -> Self {
        Self {
            slot: Slot::Accessor {
                get,
                set: Some(set),
            },
            enumerable: true,
        }
    }
}

/// What kind of object this is
#[derive(Clone)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array (elements stored as index properties)
    Array,
    /// Callable object
    Function(NativeFunction),
    /// Read-through composite over a target and its re-export sources
    Reexports(ReexportView),
}

/// Object storage
pub struct JsObject {
    kind: ObjectKind,
    prototype: Option<ObjectRef>,
    /// Own property names in definition order
    keys: Vec<String>,
    properties: FxHashMap<String, Property>,
    sealed: bool,
}

/// Shared handle to an object
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<JsObject>>);

static OBJECT_PROTOTYPE: LazyLock<ObjectRef> =
    LazyLock::new(|| ObjectRef::from_parts(ObjectKind::Ordinary, None));

static ARRAY_PROTOTYPE: LazyLock<ObjectRef> = LazyLock::new(|| {
    ObjectRef::from_parts(ObjectKind::Ordinary, Some(object_prototype()))
});

static FUNCTION_PROTOTYPE: LazyLock<ObjectRef> = LazyLock::new(|| {
    ObjectRef::from_parts(ObjectKind::Ordinary, Some(object_prototype()))
});

/// Prototype shared by plain objects
pub fn object_prototype() -> ObjectRef {
    OBJECT_PROTOTYPE.clone()
}

/// Prototype shared by arrays
pub fn array_prototype() -> ObjectRef {
    ARRAY_PROTOTYPE.clone()
}

/// Prototype shared by functions
pub fn function_prototype() -> ObjectRef {
    FUNCTION_PROTOTYPE.clone()
}

/// Whether `obj` is one of the shared base prototypes
pub fn is_base_prototype(obj: &ObjectRef) -> bool {
    obj.ptr_eq(&OBJECT_PROTOTYPE) || obj.ptr_eq(&ARRAY_PROTOTYPE) || obj.ptr_eq(&FUNCTION_PROTOTYPE)
}

enum Lookup {
    Found(Slot),
    Delegate(ReexportView),
    Next(Option<ObjectRef>),
}

impl ObjectRef {
    fn from_parts(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self(Arc::new(RwLock::new(JsObject {
            kind,
            prototype,
            keys: Vec::new(),
            properties: FxHashMap::default(),
            sealed: false,
        })))
    }

    /// Create an empty plain object
    pub fn new() -> Self {
        Self::from_parts(ObjectKind::Ordinary, Some(object_prototype()))
    }

    /// Create an empty object with an explicit prototype
    pub fn with_prototype(prototype: Option<ObjectRef>) -> Self {
        Self::from_parts(ObjectKind::Ordinary, prototype)
    }

    /// Create a plain object from data properties
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let obj = Self::new();
        for (key, value) in entries {
            obj.define_property(key, Property::data(value));
        }
        obj
    }

    /// Create an array
    pub fn array(elements: Vec<Value>) -> Self {
        let obj = Self::from_parts(ObjectKind::Array, Some(array_prototype()));
        let len = elements.len();
        for (i, value) in elements.into_iter().enumerate() {
            obj.define_property(i.to_string(), Property::data(value));
        }
        obj.define_property("length", Property::hidden(len as f64));
        obj
    }

    /// Create a callable object
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_parts(ObjectKind::Function(Arc::new(f)), Some(function_prototype()))
    }

    /// Create the read-through composite for a re-export view
    pub(crate) fn reexports(view: ReexportView) -> Self {
        Self::from_parts(ObjectKind::Reexports(view), None)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The object's prototype
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.read().prototype.clone()
    }

    /// Replace the object's prototype
    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.0.write().prototype = prototype;
    }

    /// Whether the object can be called
    pub fn is_callable(&self) -> bool {
        match &self.0.read().kind {
            ObjectKind::Function(_) => true,
            ObjectKind::Reexports(view) => view.target().is_callable(),
            _ => false,
        }
    }

    /// Whether the object is an array
    pub fn is_array(&self) -> bool {
        matches!(self.0.read().kind, ObjectKind::Array)
    }

    /// Whether the object is a re-export composite
    pub fn is_reexport_view(&self) -> bool {
        matches!(self.0.read().kind, ObjectKind::Reexports(_))
    }

    fn reexport_view(&self) -> Option<ReexportView> {
        match &self.0.read().kind {
            ObjectKind::Reexports(view) => Some(view.clone()),
            _ => None,
        }
    }

    /// Prevent new properties from being added
    pub fn seal(&self) {
        if let Some(view) = self.reexport_view() {
            view.target().seal();
            return;
        }
        self.0.write().sealed = true;
    }

    /// Whether the object is sealed
    pub fn is_sealed(&self) -> bool {
        if let Some(view) = self.reexport_view() {
            return view.target().is_sealed();
        }
        self.0.read().sealed
    }

    /// Whether the object itself has `key`
    pub fn has_own(&self, key: &str) -> bool {
        if let Some(view) = self.reexport_view() {
            return view.target().has_own(key);
        }
        self.0.read().properties.contains_key(key)
    }

    /// Own property names in definition order, enumerable or not
    pub fn own_keys(&self) -> Vec<String> {
        if let Some(view) = self.reexport_view() {
            return view.own_keys();
        }
        self.0.read().keys.clone()
    }

    /// Own enumerable property names
    ///
    /// On a re-export composite, a key is judged by the target when the
    /// target has it, otherwise by the first source that owns it.
    pub fn keys(&self) -> Vec<String> {
        if let Some(view) = self.reexport_view() {
            let target = view.target().clone();
            let sources = view.sources();
            return view
                .own_keys()
                .into_iter()
                .filter(|key| {
                    let owner = target.get_own_property(key).or_else(|| {
                        sources
                            .iter()
                            .filter_map(Value::as_object)
                            .find_map(|source| source.get_own_property(key))
                    });
                    owner.is_some_and(|prop| prop.enumerable)
                })
                .collect();
        }
        let obj = self.0.read();
        obj.keys
            .iter()
            .filter(|key| obj.properties.get(*key).is_some_and(|prop| prop.enumerable))
            .cloned()
            .collect()
    }

    /// Own property descriptor
    pub fn get_own_property(&self, key: &str) -> Option<Property> {
        if let Some(view) = self.reexport_view() {
            return view.target().get_own_property(key);
        }
        self.0.read().properties.get(key).cloned()
    }

    /// Read a property, walking the prototype chain
    ///
    /// Getters run after the object lock is released, so a getter may freely
    /// read the object it lives on.
    pub fn get(&self, key: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let lookup = {
                let guard = obj.0.read();
                match &guard.kind {
                    ObjectKind::Reexports(view) => Lookup::Delegate(view.clone()),
                    _ => match guard.properties.get(key) {
                        Some(prop) => Lookup::Found(prop.slot.clone()),
                        None => Lookup::Next(guard.prototype.clone()),
                    },
                }
            };
            match lookup {
                Lookup::Found(Slot::Data(value)) => return value,
                Lookup::Found(Slot::Accessor { get, .. }) => return get(),
                Lookup::Delegate(view) => return view.get(key),
                Lookup::Next(next) => current = next,
            }
        }
        Value::Undefined
    }

    /// Assign a property
    ///
    /// Own accessors receive the value through their setter. Returns false
    /// when the write was ignored (read-only binding, or a new key on a
    /// sealed object).
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if let Some(view) = self.reexport_view() {
            return view.target().set(key, value);
        }

        let setter = {
            let mut obj = self.0.write();
            match obj.properties.get_mut(&key) {
                Some(Property {
                    slot: Slot::Data(existing),
                    ..
                }) => {
                    *existing = value;
                    return true;
                }
                Some(Property {
                    slot: Slot::Accessor { set, .. },
                    ..
                }) => set.clone(),
                None => {
                    if obj.sealed {
                        tracing::warn!(key = %key, "ignored write of new property to sealed object");
                        return false;
                    }
                    obj.keys.push(key.clone());
                    obj.properties.insert(key, Property::data(value));
                    return true;
                }
            }
        };

        match setter {
            Some(set) => {
                set(value);
                true
            }
            None => {
                tracing::trace!(key = %key, "ignored write to getter-only property");
                false
            }
        }
    }

    /// Define or redefine an own property
    ///
    /// Returns false if `key` is new and the object is sealed.
    pub fn define_property(&self, key: impl Into<String>, property: Property) -> bool {
        let key = key.into();
        if let Some(view) = self.reexport_view() {
            return view.target().define_property(key, property);
        }
        let mut obj = self.0.write();
        if obj.properties.contains_key(&key) {
            obj.properties.insert(key, property);
            return true;
        }
        if obj.sealed {
            tracing::warn!(key = %key, "ignored definition of new property on sealed object");
            return false;
        }
        obj.keys.push(key.clone());
        obj.properties.insert(key, property);
        true
    }

    /// Define an own property unless one already exists
    ///
    /// Returns true if the property was added.
    pub fn define_if_absent(&self, key: impl Into<String>, property: Property) -> bool {
        let key = key.into();
        if self.has_own(&key) {
            return false;
        }
        self.define_property(key, property)
    }

    /// Call the object
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if let Some(view) = self.reexport_view() {
            return view.target().call(args);
        }
        let callee = match &self.0.read().kind {
            ObjectKind::Function(f) => Some(Arc::clone(f)),
            _ => None,
        };
        match callee {
            Some(f) => f(args),
            None => Err(BundleError::type_error("object is not a function")),
        }
    }

    /// Whether the object carries the ES module marker
    pub fn is_es_module(&self) -> bool {
        self.get(ES_MODULE_KEY).is_truthy()
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("keys", &self.own_keys())
            .finish()
    }
}
