// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! import / require bridge between module bodies and the registry

use super::{Module, ModuleRegistry};
use crate::error::Result;
use crate::interop::interop_raw;
use crate::value::Value;

/// ESM import: the dependency's namespace object
///
/// A stored instantiation error is raised again without re-running the body.
/// The namespace is built on first import and cached on the record.
pub fn import_as_namespace(
    registry: &dyn ModuleRegistry,
    consumer: Option<&Module>,
    id: &str,
) -> Result<Value> {
    let module = registry.get_or_instantiate(id, consumer)?;
    if let Some(err) = module.error() {
        return Err(err);
    }
    if let Some(namespace) = module.namespace_object() {
        return Ok(namespace);
    }

    let raw = module.exports();
    let allow_raw_default = raw.as_object().is_some_and(|obj| obj.is_es_module());
    let namespace = interop_raw(&raw, allow_raw_default);
    Ok(module.set_namespace_object(namespace))
}

/// CommonJS require: the dependency's raw exports
pub fn import_raw(registry: &dyn ModuleRegistry, consumer: Option<&Module>, id: &str) -> Result<Value> {
    let module = registry.get_or_instantiate(id, consumer)?;
    if let Some(err) = module.error() {
        return Err(err);
    }
    Ok(module.exports())
}
