//! Messages exchanged between the compile host and its worker.
//!
//! The host writes one [`CompileRequest`] to the worker's stdin and reads one
//! [`CompileResponse`] from its stdout. Both are JSON with camelCase fields.

use crate::library::EntryPointMode;
use df_template::UnsupportedCapabilityPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub project_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_suffix_override: Option<String>,
    /// Evaluate exactly these project-relative files instead of discovering them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
    #[serde(default)]
    pub use_legacy_entry_points: bool,
    /// Returned in place of the encoded graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_override: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub entry_point_mode: EntryPointMode,
    #[serde(default)]
    pub unsupported_capabilities: UnsupportedCapabilityPolicy,
    /// Per-file instruction budget; `0` disables the limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<u64>,
}

impl CompileRequest {
    pub fn new(project_dir: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Self::default()
        }
    }
}

/// A fatal error in a form that survives the process boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    pub message: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompileResponse {
    Success {
        #[serde(rename = "encodedGraph")]
        encoded_graph: String,
    },
    Error {
        error: SerializedError,
    },
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
