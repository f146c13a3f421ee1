// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records, the registry and the import bridge
//!
//! ## Records
//! - one [`Module`] per id, created before its body runs
//! - `exports`, cached namespace object, stored error, `loaded` flag
//! - parent/child edges maintained by the registry
//!
//! ## Imports
//! - [`import_as_namespace`]: ESM view, built once per record
//! - [`import_raw`]: CommonJS `module.exports`

mod cache;
mod context;
mod import;
mod record;
mod registry;

pub use cache::ModuleCache;
pub use context::ModuleContext;
pub use import::{import_as_namespace, import_raw};
pub use record::{Module, ModuleId};
pub use registry::{ModuleFactory, ModuleRegistry, Registry};
