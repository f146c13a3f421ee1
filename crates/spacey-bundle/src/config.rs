// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime configuration

use crate::error::{BundleError, Result};
use crate::relative_url::DEFAULT_RELATIVE_BASE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of environment variables read by [`RuntimeConfig::load_from_env`]
pub const ENV_PREFIX: &str = "SPACEY_BUNDLE_";

/// Configuration for the bundle runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Prefix chunk URLs are built on
    pub chunk_base_path: String,

    /// Base relative URLs are parsed against
    pub relative_url_base: String,

    /// Custom config values
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_base_path: "/".to_string(),
            relative_url_base: DEFAULT_RELATIVE_BASE.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with `SPACEY_BUNDLE_*` environment variables.
    pub fn load() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SPACEY_BUNDLE_*` environment variables.
    pub fn load_from_env(&mut self) {
        self.merge_vars(std::env::vars());
    }

    fn merge_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "chunk-base-path" => self.chunk_base_path = value.to_string(),
            "relative-url-base" => self.relative_url_base = value.to_string(),
            _ => {
                self.extra
                    .insert(key.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    /// Get a configuration value.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "chunk-base-path" => Some(self.chunk_base_path.clone()),
            "relative-url-base" => Some(self.relative_url_base.clone()),
            _ => self.extra.get(key).and_then(|v| v.as_str().map(String::from)),
        }
    }

    /// Check that the URL base parses.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.relative_url_base)
            .map(|_| ())
            .map_err(|err| BundleError::Config(format!("relative-url-base: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.chunk_base_path, "/");
        assert_eq!(config.relative_url_base, "x:/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = RuntimeConfig::default();
        config.set("chunk-base-path", "/_next/");
        config.set("custom", "value");

        assert_eq!(config.get("chunk-base-path").as_deref(), Some("/_next/"));
        assert_eq!(config.get("custom").as_deref(), Some("value"));
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn test_env_vars_are_mapped() {
        let mut config = RuntimeConfig::default();
        config.merge_vars([
            ("SPACEY_BUNDLE_CHUNK_BASE_PATH".to_string(), "/assets/".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);
        assert_eq!(config.chunk_base_path, "/assets/");
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_from_json() {
        let config = RuntimeConfig::from_json(r#"{"chunk_base_path": "/static/", "build": "42"}"#).unwrap();
        assert_eq!(config.chunk_base_path, "/static/");
        assert_eq!(config.relative_url_base, "x:/");
        assert_eq!(config.get("build").as_deref(), Some("42"));
    }

    #[test]
    fn test_from_json_rejects_bad_base() {
        let err = RuntimeConfig::from_json(r#"{"relative_url_base": "nope"}"#).unwrap_err();
        assert!(matches!(err, BundleError::Config(_)));
        assert!(RuntimeConfig::from_json("[").is_err());
    }
}
