// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-bundle
//!
//! Module runtime for bundled JavaScript, built for the Spacey engine.
//!
//! A bundler emits one factory per module. This crate instantiates them and
//! links their exports:
//!
//! - CommonJS / ES module interop (getter-backed namespace objects)
//! - `export * from` re-exports through a live read-through view
//! - async modules (top-level await), including circular ones
//! - `require.context` maps and named lookups
//! - chunk paths and relative URLs
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_bundle::{ExportBinding, Registry, RuntimeConfig, Value};
//!
//! let registry = Registry::new(RuntimeConfig::default());
//! registry.register("./answer.js", |ctx| {
//!     ctx.esm_export([("answer", ExportBinding::getter(|| Value::from(42)))])
//! });
//! registry.register("./main.js", |ctx| {
//!     let answer = ctx.import("./answer.js")?;
//!     ctx.export_value(answer.get("answer"));
//!     Ok(())
//! });
//!
//! assert_eq!(registry.require("./main.js").unwrap(), Value::from(42));
//! ```
//!
//! Async module bodies suspend through [`AsyncModuleContext::handle_dependencies`]
//! and resume as jobs on the registry's [`Scheduler`]; drive it with
//! [`Scheduler::run_until_idle`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod async_module;
pub mod chunk;
pub mod config;
pub mod error;
pub mod interop;
pub mod lookup;
pub mod module_system;
pub mod relative_url;
pub mod runtime;
pub mod value;

// Re-exports
pub use async_module::{
    AsyncExports, AsyncModuleContext, AsyncModuleStatus, Dependencies, DependencyValues,
    async_module,
};
pub use chunk::{ChunkData, chunk_url, get_chunk_path};
pub use config::RuntimeConfig;
pub use error::{BundleError, MODULE_NOT_FOUND, Result};
pub use interop::{ExportBinding, declare_named_exports, dynamic_export, interop_raw, publish_as_esm};
pub use lookup::{ContextEntry, ContextMap, LookupMap, lookup_by_name};
pub use module_system::{
    Module, ModuleContext, ModuleId, ModuleRegistry, Registry, import_as_namespace, import_raw,
};
pub use relative_url::RelativeUrl;
pub use runtime::{Promise, PromiseState, Scheduler};
pub use value::{ObjectRef, Property, Value};
