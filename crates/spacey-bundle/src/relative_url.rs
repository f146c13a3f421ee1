// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! URL object for relative references
//!
//! Parses like a WHATWG URL against a synthetic base, then reports the input
//! unchanged as `href`, with an empty `origin` and `protocol`.

use crate::config::RuntimeConfig;
use crate::error::{BundleError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Base used when no configuration is at hand
pub const DEFAULT_RELATIVE_BASE: &str = "x:/";

/// URL-like view of a relative reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeUrl {
    /// The input, verbatim
    pub href: String,
    /// Input up to the first `?` or `#`
    pub pathname: String,
    /// Query including its `?`, or empty
    pub search: String,
    /// Fragment including its `#`, or empty
    pub hash: String,
    /// Host and port
    pub host: String,
    /// Host without port
    pub hostname: String,
    /// Port, or empty
    pub port: String,
    /// Username, or empty
    pub username: String,
    /// Password, or empty
    pub password: String,
    /// Always empty
    pub origin: String,
    /// Always empty
    pub protocol: String,
}

impl RelativeUrl {
    /// Parse against [`DEFAULT_RELATIVE_BASE`]
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with_base(DEFAULT_RELATIVE_BASE, input)
    }

    /// Parse against the configured base
    pub fn parse_with_config(config: &RuntimeConfig, input: &str) -> Result<Self> {
        Self::parse_with_base(&config.relative_url_base, input)
    }

    fn parse_with_base(base: &str, input: &str) -> Result<Self> {
        let invalid = |err: url::ParseError| BundleError::InvalidUrl {
            input: input.to_string(),
            reason: err.to_string(),
        };
        let resolved = Url::parse(base).and_then(|base| base.join(input)).map_err(invalid)?;

        let pathname = match input.find(['?', '#']) {
            Some(end) => input[..end].to_string(),
            None => input.to_string(),
        };
        let hostname = resolved.host_str().unwrap_or_default().to_string();
        let port = resolved.port().map(|p| p.to_string()).unwrap_or_default();
        let host = if port.is_empty() {
            hostname.clone()
        } else {
            format!("{}:{}", hostname, port)
        };

        Ok(Self {
            href: input.to_string(),
            pathname,
            search: prefixed('?', resolved.query()),
            hash: prefixed('#', resolved.fragment()),
            host,
            hostname,
            port,
            username: resolved.username().to_string(),
            password: resolved.password().unwrap_or_default().to_string(),
            origin: String::new(),
            protocol: String::new(),
        })
    }
}

fn prefixed(prefix: char, part: Option<&str>) -> String {
    match part {
        Some(part) if !part.is_empty() => format!("{}{}", prefix, part),
        _ => String::new(),
    }
}

impl fmt::Display for RelativeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}

impl Serialize for RelativeUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let url = RelativeUrl::parse("./assets/logo.png?v=2#top").unwrap();
        assert_eq!(url.href, "./assets/logo.png?v=2#top");
        assert_eq!(url.pathname, "./assets/logo.png");
        assert_eq!(url.search, "?v=2");
        assert_eq!(url.hash, "#top");
        assert_eq!(url.origin, "");
        assert_eq!(url.protocol, "");
        assert_eq!(url.to_string(), "./assets/logo.png?v=2#top");
    }

    #[test]
    fn test_plain_path_has_no_query() {
        let url = RelativeUrl::parse("/static/media/font.woff2").unwrap();
        assert_eq!(url.pathname, "/static/media/font.woff2");
        assert_eq!(url.search, "");
        assert_eq!(url.hash, "");
        assert_eq!(url.host, "");
    }

    #[test]
    fn test_serializes_as_input() {
        let url = RelativeUrl::parse("a/b.svg").unwrap();
        assert_eq!(serde_json::to_string(&url).unwrap(), r#""a/b.svg""#);
    }

    #[test]
    fn test_invalid_base_is_reported() {
        let err = RelativeUrl::parse_with_base("not a base", "a").unwrap_err();
        assert!(matches!(err, BundleError::InvalidUrl { .. }));
    }
}
