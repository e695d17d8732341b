//! Warehouse object identifiers.

use crate::error::{CoreError, CoreResult};
use crate::settings::Warehouse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully-qualified warehouse object: `database.schema.name`.
///
/// Targets compare structurally; the derived ordering is what keeps compiled
/// graphs sorted deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub schema: String,
    pub name: String,
}

impl Target {
    pub fn new(database: Option<String>, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database,
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Stable string key suitable for maps and on-disk caches.
    pub fn key(&self) -> String {
        serde_json::json!([self.database, self.schema, self.name]).to_string()
    }

    /// `db.schema.name`, or `schema.name` without a database.
    pub fn readable(&self) -> String {
        match &self.database {
            Some(db) => format!("{}.{}.{}", db, self.schema, self.name),
            None => format!("{}.{}", self.schema, self.name),
        }
    }

    /// Identifier as it must appear in SQL for the given warehouse.
    pub fn quoted(&self, warehouse: Warehouse) -> String {
        match warehouse {
            Warehouse::BigQuery => format!("`{}`", self.readable()),
        }
    }

    /// Problems with the individual components, one message per problem.
    pub fn component_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.contains('.') {
            errors.push(format!(
                "Action target names cannot include '.': \"{}\"",
                self.name
            ));
        }
        if self.schema.contains('.') {
            errors.push(format!(
                "Action target schemas cannot include '.': \"{}\"",
                self.schema
            ));
        }
        if let Some(db) = &self.database {
            if db.contains('.') {
                errors.push(format!(
                    "Action target databases cannot include '.': \"{}\"",
                    db
                ));
            }
        }
        errors
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readable())
    }
}

/// A possibly partial reference to a target, as written by project code.
///
/// Missing parts match any value during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl TargetRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    /// Build from positional parts: `name`, `schema, name` or `database, schema, name`.
    pub fn from_parts(parts: &[String]) -> CoreResult<Self> {
        let reference = match parts {
            [name] => Self::named(name.clone()),
            [schema, name] => Self {
                database: None,
                schema: Some(schema.clone()),
                name: name.clone(),
            },
            [database, schema, name] => Self {
                database: Some(database.clone()),
                schema: Some(schema.clone()),
                name: name.clone(),
            },
            _ => {
                return Err(CoreError::InvalidReference {
                    message: format!("expected 1 to 3 name parts, got {}", parts.len()),
                })
            }
        };
        if reference.name.is_empty() {
            return Err(CoreError::EmptyName {
                context: "reference".into(),
            });
        }
        Ok(reference)
    }

    /// Parse `db.schema.name`, `schema.name` or a bare name.
    pub fn parse(reference: &str) -> Self {
        let parts: Vec<String> = reference.split('.').map(str::to_string).collect();
        Self::from_parts(&parts).unwrap_or_else(|_| Self::named(reference))
    }

    /// True if every part present in this reference equals the target's.
    pub fn matches(&self, target: &Target) -> bool {
        if self.name != target.name {
            return false;
        }
        if let Some(schema) = &self.schema {
            if schema != &target.schema {
                return false;
            }
        }
        if let Some(db) = &self.database {
            if Some(db) != target.database.as_ref() {
                return false;
            }
        }
        true
    }
}

impl From<&Target> for TargetRef {
    fn from(target: &Target) -> Self {
        Self {
            database: target.database.clone(),
            schema: Some(target.schema.clone()),
            name: target.name.clone(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [self.database.as_deref(), self.schema.as_deref()]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.name.as_str()))
            .collect();
        f.write_str(&parts.join("."))
    }
}

#[cfg(test)]
#[path = "target_test.rs"]
mod tests;
