//! Which context functions each action type may use.
//!
//! SQL programs are bound with every name in [`LEGACY_BINDINGS`]. A name
//! outside the action type's table is handled by the
//! [`UnsupportedCapabilityPolicy`].

use df_core::ActionKind;
use df_sqlx::LEGACY_BINDINGS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TABLE: &[&str] = &[
    "config",
    "type",
    "ref",
    "resolve",
    "self",
    "this",
    "name",
    "dependencies",
    "database",
    "schema",
    "when",
    "incremental",
    "where",
    "preOps",
    "postOps",
    "descriptor",
    "describe",
    "tags",
    "disabled",
    "bigquery",
];

const ASSERTION: &[&str] = &[
    "ref",
    "resolve",
    "self",
    "this",
    "name",
    "database",
    "schema",
    "dependencies",
    "when",
    "tags",
];

const OPERATION: &[&str] = &[
    "ref",
    "resolve",
    "self",
    "this",
    "name",
    "database",
    "schema",
    "dependencies",
    "when",
    "tags",
    "hasOutput",
];

const DECLARATION: &[&str] = &["self", "this", "name", "database", "schema"];

/// What happens when project code calls a bound name its action type lacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedCapabilityPolicy {
    /// Return an empty string, as legacy projects expect
    Silent,
    /// Return an empty string and record a warning
    #[default]
    Warn,
    /// Fail the file
    Error,
}

impl UnsupportedCapabilityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedCapabilityPolicy::Silent => "silent",
            UnsupportedCapabilityPolicy::Warn => "warn",
            UnsupportedCapabilityPolicy::Error => "error",
        }
    }
}

impl fmt::Display for UnsupportedCapabilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnsupportedCapabilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(UnsupportedCapabilityPolicy::Silent),
            "warn" => Ok(UnsupportedCapabilityPolicy::Warn),
            "error" => Ok(UnsupportedCapabilityPolicy::Error),
            other => Err(format!(
                "unknown policy '{}', expected silent, warn or error",
                other
            )),
        }
    }
}

/// Names usable by an action of `kind`
pub fn supported_capabilities(kind: ActionKind) -> &'static [&'static str] {
    match kind {
        ActionKind::Table => TABLE,
        ActionKind::Assertion | ActionKind::Notebook => ASSERTION,
        ActionKind::Operation => OPERATION,
        ActionKind::Declaration => DECLARATION,
    }
}

pub fn is_supported(kind: ActionKind, name: &str) -> bool {
    supported_capabilities(kind).contains(&name)
}

/// Bound names that do nothing for `kind`
pub fn unsupported_bindings(kind: ActionKind) -> Vec<&'static str> {
    LEGACY_BINDINGS
        .iter()
        .copied()
        .filter(|name| !is_supported(kind, name))
        .collect()
}

#[cfg(test)]
#[path = "capabilities_test.rs"]
mod tests;
