// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the bundle runtime

use crate::module_system::ModuleId;
use crate::value::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for bundle runtime operations
pub type Result<T> = std::result::Result<T, BundleError>;

/// Machine-readable code carried by failed named lookups
pub const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";

/// Errors that can occur while instantiating and linking modules
///
/// Errors are cheap to clone so a failure stored on a module record can be
/// replayed to every later importer.
#[derive(Debug, Clone, Error)]
pub enum BundleError {
    /// Named lookup against a fixed mapping failed
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// The registry has no factory for a requested module
    #[error(
        "Module {id} was instantiated because it was required from module {parent}, but the module factory is not available"
    )]
    FactoryNotAvailable {
        /// Requested module id
        id: ModuleId,
        /// Module that requested it
        parent: String,
    },

    /// A module body failed while it was running
    #[error("Error instantiating module '{id}': {source}")]
    Instantiation {
        /// Module whose body failed
        id: ModuleId,
        /// What the body raised
        source: Arc<BundleError>,
    },

    /// A value thrown by a module body
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// Type error (wrong kind of value)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// URL could not be parsed
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl {
        /// Input string
        input: String,
        /// Parser message
        reason: String,
    },

    /// Chunk descriptor without a usable path
    #[error("Invalid chunk descriptor: {0}")]
    InvalidChunk(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl BundleError {
    /// Create a module not found error
    pub fn module_not_found(name: impl Into<String>) -> Self {
        Self::ModuleNotFound(name.into())
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a generic error
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Wrap a thrown value
    pub fn thrown(value: impl Into<Value>) -> Self {
        Self::Thrown(value.into())
    }

    /// Wrap the failure of a module body
    pub fn instantiation(id: impl Into<ModuleId>, source: BundleError) -> Self {
        Self::Instantiation {
            id: id.into(),
            source: Arc::new(source),
        }
    }

    /// Machine-readable code, if this error kind has one
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::ModuleNotFound(_) => Some(MODULE_NOT_FOUND),
            _ => None,
        }
    }

    /// Whether this is a failed named lookup
    pub fn is_module_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound(_))
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_not_found_code() {
        let err = BundleError::module_not_found("./missing");
        assert_eq!(err.code(), Some(MODULE_NOT_FOUND));
        assert_eq!(err.to_string(), "Cannot find module './missing'");
    }

    #[test]
    fn test_other_errors_have_no_code() {
        assert_eq!(BundleError::type_error("bad").code(), None);
        assert_eq!(BundleError::thrown("boom").code(), None);
    }

    #[test]
    fn test_instantiation_keeps_source() {
        let err = BundleError::instantiation("a", BundleError::thrown("boom"));
        assert_eq!(err.to_string(), "Error instantiating module 'a': Uncaught boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
