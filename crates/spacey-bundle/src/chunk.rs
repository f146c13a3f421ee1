// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Chunk descriptors

use crate::config::RuntimeConfig;
use crate::error::{BundleError, Result};
use crate::module_system::ModuleId;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Chunk descriptor as found in a chunk manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkData {
    /// Bare chunk path
    Path(String),
    /// Structured record
    Record(ChunkRecord),
}

/// Structured chunk descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkRecord {
    /// Chunk path
    pub path: String,
    /// Modules the chunk carries
    pub included: Vec<ModuleId>,
    /// Modules left to other chunks
    pub excluded: Vec<ModuleId>,
    /// Per-module chunks making up this one
    pub module_chunks: Vec<String>,
}

impl ChunkData {
    /// Path of the chunk
    pub fn path(&self) -> &str {
        match self {
            ChunkData::Path(path) => path,
            ChunkData::Record(record) => &record.path,
        }
    }

    /// Parse a descriptor from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl TryFrom<&Value> for ChunkData {
    type Error = BundleError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(path) => Ok(ChunkData::Path(path.clone())),
            Value::Object(obj) => match obj.get("path") {
                Value::String(path) => Ok(ChunkData::Record(ChunkRecord {
                    path,
                    included: string_list(&obj.get("included")),
                    excluded: string_list(&obj.get("excluded")),
                    module_chunks: string_list(&obj.get("moduleChunks")),
                })),
                other => Err(BundleError::InvalidChunk(format!(
                    "expected a string path, got {}",
                    other.type_of()
                ))),
            },
            other => Err(BundleError::InvalidChunk(format!(
                "expected a path or a record, got {}",
                other.type_of()
            ))),
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    let Some(obj) = value.as_object().filter(|obj| obj.is_array()) else {
        return Vec::new();
    };
    obj.keys()
        .iter()
        .filter_map(|key| obj.get(key).as_str().map(str::to_string))
        .collect()
}

/// Normalize a chunk descriptor to its path
pub fn get_chunk_path(data: &Value) -> Result<String> {
    ChunkData::try_from(data).map(|chunk| chunk.path().to_string())
}

/// URL a chunk is served from
///
/// Each `/`-separated segment of `path` is percent-encoded and the result is
/// appended to the configured chunk base path.
pub fn chunk_url(config: &RuntimeConfig, path: &str) -> String {
    let encoded: Vec<_> = path.split('/').map(urlencoding::encode).collect();
    format!("{}{}", config.chunk_base_path, encoded.join("/"))
}
