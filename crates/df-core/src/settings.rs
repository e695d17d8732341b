//! Workflow settings: `workflow_settings.yaml` (current) or `dataform.json` (deprecated)

use crate::error::{CoreError, CoreResult};
use crate::path::is_valid_affix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current settings file name
pub const WORKFLOW_SETTINGS_FILE: &str = "workflow_settings.yaml";

/// Deprecated settings file name
pub const DATAFORM_JSON_FILE: &str = "dataform.json";

/// Schema used when a project does not configure one
pub const DEFAULT_SCHEMA: &str = "dataform";

/// Schema for assertions when a project does not configure one
pub const DEFAULT_ASSERTION_SCHEMA: &str = "dataform_assertions";

/// Supported warehouses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Warehouse {
    #[default]
    #[serde(rename = "bigquery")]
    BigQuery,
}

impl Warehouse {
    /// Resolve a configured warehouse; absent means the default.
    pub fn from_setting(value: Option<&str>) -> CoreResult<Self> {
        match value {
            None | Some("bigquery") => Ok(Warehouse::BigQuery),
            Some(other) => Err(CoreError::UnsupportedWarehouse {
                warehouse: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Warehouse::BigQuery => "bigquery",
        }
    }
}

impl std::fmt::Display for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which file the settings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    WorkflowSettingsYaml,
    DataformJson,
}

/// Raw `workflow_settings.yaml` contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WorkflowSettingsFile {
    #[serde(default, alias = "defaultDatabase")]
    default_project: Option<String>,
    #[serde(default, alias = "defaultSchema")]
    default_dataset: Option<String>,
    #[serde(default)]
    default_location: Option<String>,
    #[serde(default, alias = "assertionSchema")]
    default_assertion_dataset: Option<String>,
    #[serde(default, alias = "databaseSuffix")]
    project_suffix: Option<String>,
    #[serde(default, alias = "schemaSuffix")]
    dataset_suffix: Option<String>,
    #[serde(default, alias = "tablePrefix")]
    name_prefix: Option<String>,
    #[serde(default)]
    vars: BTreeMap<String, String>,
    #[serde(default)]
    dataform_core_version: Option<String>,
    #[serde(default)]
    warehouse: Option<String>,
}

/// Raw `dataform.json` contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DataformJsonFile {
    #[serde(default)]
    warehouse: Option<String>,
    #[serde(default)]
    default_database: Option<String>,
    #[serde(default)]
    default_schema: Option<String>,
    #[serde(default)]
    default_location: Option<String>,
    #[serde(default)]
    assertion_schema: Option<String>,
    #[serde(default)]
    database_suffix: Option<String>,
    #[serde(default)]
    schema_suffix: Option<String>,
    #[serde(default)]
    table_prefix: Option<String>,
    #[serde(default)]
    vars: BTreeMap<String, String>,
    #[serde(default)]
    dataform_core_version: Option<String>,
}

/// Resolved project configuration, embedded in every compiled graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub warehouse: Warehouse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_database: Option<String>,
    pub default_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,
    pub assertion_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataform_core_version: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            warehouse: Warehouse::BigQuery,
            default_database: None,
            default_schema: DEFAULT_SCHEMA.to_string(),
            default_location: None,
            assertion_schema: DEFAULT_ASSERTION_SCHEMA.to_string(),
            database_suffix: None,
            schema_suffix: None,
            table_prefix: None,
            vars: BTreeMap::new(),
            dataform_core_version: None,
        }
    }
}

/// Per-request overrides applied on top of the project file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub schema_suffix: Option<String>,
    pub vars: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load settings from a project directory.
    ///
    /// Exactly one of `workflow_settings.yaml` and `dataform.json` must exist.
    pub fn load_from_dir(dir: &Path) -> CoreResult<(Self, SettingsSource)> {
        let yaml_path = dir.join(WORKFLOW_SETTINGS_FILE);
        let json_path = dir.join(DATAFORM_JSON_FILE);

        match (yaml_path.is_file(), json_path.is_file()) {
            (true, true) => Err(CoreError::ConflictingSettings {
                dir: dir.display().to_string(),
            }),
            (true, false) => {
                let content = read_settings_file(&yaml_path)?;
                let config = Self::from_yaml_str(&content).map_err(|e| with_path(e, &yaml_path))?;
                Ok((config, SettingsSource::WorkflowSettingsYaml))
            }
            (false, true) => {
                log::warn!(
                    "{} is deprecated; migrate to {}",
                    DATAFORM_JSON_FILE,
                    WORKFLOW_SETTINGS_FILE
                );
                let content = read_settings_file(&json_path)?;
                let config = Self::from_json_str(&content).map_err(|e| with_path(e, &json_path))?;
                Ok((config, SettingsSource::DataformJson))
            }
            (false, false) => Err(CoreError::SettingsNotFound {
                path: dir.display().to_string(),
            }),
        }
    }

    /// Parse `workflow_settings.yaml` contents
    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        let raw: WorkflowSettingsFile = if content.trim().is_empty() {
            WorkflowSettingsFile::default()
        } else {
            serde_yaml::from_str(content)?
        };
        let config = Self {
            warehouse: Warehouse::from_setting(raw.warehouse.as_deref())?,
            default_database: raw.default_project,
            default_schema: raw
                .default_dataset
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            default_location: raw.default_location,
            assertion_schema: raw
                .default_assertion_dataset
                .unwrap_or_else(|| DEFAULT_ASSERTION_SCHEMA.to_string()),
            database_suffix: raw.project_suffix,
            schema_suffix: raw.dataset_suffix,
            table_prefix: raw.name_prefix,
            vars: raw.vars,
            dataform_core_version: raw.dataform_core_version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse deprecated `dataform.json` contents
    pub fn from_json_str(content: &str) -> CoreResult<Self> {
        let raw: DataformJsonFile = serde_json::from_str(content)?;
        let config = Self {
            warehouse: Warehouse::from_setting(raw.warehouse.as_deref())?,
            default_database: raw.default_database,
            default_schema: raw
                .default_schema
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            default_location: raw.default_location,
            assertion_schema: raw
                .assertion_schema
                .unwrap_or_else(|| DEFAULT_ASSERTION_SCHEMA.to_string()),
            database_suffix: raw.database_suffix,
            schema_suffix: raw.schema_suffix,
            table_prefix: raw.table_prefix,
            vars: raw.vars,
            dataform_core_version: raw.dataform_core_version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail if the project pins a core version other than the loaded one.
    pub fn check_core_version(&self, loaded: &str) -> CoreResult<()> {
        match &self.dataform_core_version {
            Some(declared) if declared != loaded => Err(CoreError::VersionMismatch {
                declared: declared.clone(),
                loaded: loaded.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Apply request overrides; vars from the request win over project vars.
    pub fn apply_overrides(&mut self, overrides: &SettingsOverrides) -> CoreResult<()> {
        if let Some(suffix) = &overrides.schema_suffix {
            if !is_valid_affix(suffix) {
                return Err(CoreError::SettingsInvalid {
                    message: format!(
                        "schema suffix override '{}' may only contain letters, digits and underscores",
                        suffix
                    ),
                });
            }
            self.schema_suffix = if suffix.is_empty() {
                None
            } else {
                Some(suffix.clone())
            };
        }
        self.vars
            .extend(overrides.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// Apply the configured name prefix
    pub fn finalize_name(&self, name: &str) -> String {
        match self.table_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, name),
            _ => name.to_string(),
        }
    }

    /// Apply the configured schema suffix
    pub fn finalize_schema(&self, schema: &str) -> String {
        match self.schema_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{}_{}", schema, suffix),
            _ => schema.to_string(),
        }
    }

    /// Apply the configured database suffix
    pub fn finalize_database(&self, database: Option<&str>) -> Option<String> {
        database.map(|db| match self.database_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{}_{}", db, suffix),
            _ => db.to_string(),
        })
    }

    fn validate(&self) -> CoreResult<()> {
        if self.default_schema.is_empty() {
            return Err(CoreError::SettingsInvalid {
                message: "default schema cannot be empty".to_string(),
            });
        }
        if self.assertion_schema.is_empty() {
            return Err(CoreError::SettingsInvalid {
                message: "assertion schema cannot be empty".to_string(),
            });
        }
        let affixes = [
            ("database suffix", &self.database_suffix),
            ("schema suffix", &self.schema_suffix),
            ("table prefix", &self.table_prefix),
        ];
        for (label, value) in affixes {
            if let Some(v) = value {
                if !is_valid_affix(v) {
                    return Err(CoreError::SettingsInvalid {
                        message: format!(
                            "{} '{}' may only contain letters, digits and underscores",
                            label, v
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

fn read_settings_file(path: &Path) -> CoreResult<String> {
    std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })
}

fn with_path(err: CoreError, path: &Path) -> CoreError {
    match err {
        CoreError::YamlParse(e) => CoreError::SettingsParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        },
        CoreError::Json(e) => CoreError::SettingsParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
