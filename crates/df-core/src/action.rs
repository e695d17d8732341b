//! Action model: author-facing configuration, per-file registrations, and the
//! finalized records stored in a compiled graph.

use crate::error::{CoreError, CoreResult};
use crate::target::{Target, TargetRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The variants of the action sum type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Table,
    Operation,
    Assertion,
    Declaration,
    Notebook,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Table => "table",
            ActionKind::Operation => "operation",
            ActionKind::Assertion => "assertion",
            ActionKind::Declaration => "declaration",
            ActionKind::Notebook => "notebook",
        };
        f.write_str(s)
    }
}

/// How a table is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    #[default]
    Table,
    View,
    Incremental,
    Inline,
}

impl TableType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(TableType::Table),
            "view" => Some(TableType::View),
            "incremental" => Some(TableType::Incremental),
            "inline" => Some(TableType::Inline),
            _ => None,
        }
    }
}

/// Value of the `type` config key: a dataset type or another action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Table,
    View,
    Incremental,
    Inline,
    Operations,
    Assertion,
    Declaration,
    /// A unit test; not an action
    Test,
}

impl ConfigType {
    /// The action kind this type declares, or `None` for tests
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ConfigType::Table | ConfigType::View | ConfigType::Incremental | ConfigType::Inline => {
                Some(ActionKind::Table)
            }
            ConfigType::Operations => Some(ActionKind::Operation),
            ConfigType::Assertion => Some(ActionKind::Assertion),
            ConfigType::Declaration => Some(ActionKind::Declaration),
            ConfigType::Test => None,
        }
    }

    pub fn table_type(&self) -> Option<TableType> {
        match self {
            ConfigType::Table => Some(TableType::Table),
            ConfigType::View => Some(TableType::View),
            ConfigType::Incremental => Some(TableType::Incremental),
            ConfigType::Inline => Some(TableType::Inline),
            _ => None,
        }
    }

    pub fn is_dataset(&self) -> bool {
        self.table_type().is_some()
    }
}

/// A dependency as written in config: a bare name or a partial target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Name(String),
    Target(TargetRef),
}

impl From<DependencySpec> for TargetRef {
    fn from(spec: DependencySpec) -> Self {
        match spec {
            DependencySpec::Name(name) => TargetRef::parse(&name),
            DependencySpec::Target(target) => target,
        }
    }
}

/// Column documentation: a plain description or a nested record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnDoc {
    Description(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        columns: BTreeMap<String, ColumnDoc>,
    },
}

/// Inline data-quality assertions declared on a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TableAssertions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_keys: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_null: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_conditions: Vec<String>,
}

impl TableAssertions {
    pub fn is_empty(&self) -> bool {
        self.unique_key.is_empty()
            && self.unique_keys.is_empty()
            && self.non_null.is_empty()
            && self.row_conditions.is_empty()
    }
}

/// BigQuery-specific dataset options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BigQueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_partition_filter: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_expiration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_partition_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_options: BTreeMap<String, String>,
}

/// Configuration written by authors in a `config { }` block or via
/// `config(...)` / `.config(...)` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ActionConfig {
    #[serde(default, rename = "type")]
    pub config_type: Option<ConfigType>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Option<BTreeMap<String, ColumnDoc>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub dependencies: Option<Vec<DependencySpec>>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub protected: Option<bool>,
    #[serde(default)]
    pub has_output: Option<bool>,
    #[serde(default)]
    pub unique_key: Option<Vec<String>>,
    #[serde(default)]
    pub assertions: Option<TableAssertions>,
    #[serde(default)]
    pub bigquery: Option<BigQueryOptions>,
    /// The dataset a unit test runs against
    #[serde(default)]
    pub dataset: Option<DependencySpec>,
}

impl ActionConfig {
    /// Keys that are set but mean nothing to a unit test
    pub fn keys_unused_by_tests(&self) -> Vec<&'static str> {
        [
            ("schema", self.schema.is_some()),
            ("database", self.database.is_some()),
            ("description", self.description.is_some()),
            ("columns", self.columns.is_some()),
            ("disabled", self.disabled.is_some()),
            ("protected", self.protected.is_some()),
            ("hasOutput", self.has_output.is_some()),
            ("uniqueKey", self.unique_key.is_some()),
            ("assertions", self.assertions.is_some()),
            ("bigquery", self.bigquery.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, set)| set.then_some(key))
        .collect()
    }
}

/// Description and column docs attached to an action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnDoc>,
}

impl ActionDescriptor {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.columns.is_empty()
    }
}

/// Variant-specific data produced by one file execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationPayload {
    Table {
        table_type: TableType,
        query: String,
        incremental_query: Option<String>,
        pre_ops: Vec<String>,
        post_ops: Vec<String>,
        incremental_where: Option<String>,
        protected: bool,
        unique_key: Vec<String>,
        assertions: TableAssertions,
        bigquery: Option<BigQueryOptions>,
    },
    Operation {
        queries: Vec<String>,
        has_output: bool,
    },
    Assertion {
        query: String,
    },
    Declaration,
    Notebook {
        contents: String,
    },
}

impl RegistrationPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            RegistrationPayload::Table { .. } => ActionKind::Table,
            RegistrationPayload::Operation { .. } => ActionKind::Operation,
            RegistrationPayload::Assertion { .. } => ActionKind::Assertion,
            RegistrationPayload::Declaration => ActionKind::Declaration,
            RegistrationPayload::Notebook { .. } => ActionKind::Notebook,
        }
    }
}

/// The message a file execution sends to the session: one finished action.
///
/// Query texts may still contain deferred reference markers; the session
/// substitutes them once every target is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub file_path: String,
    pub name: String,
    pub schema: Option<String>,
    pub database: Option<String>,
    pub dependencies: Vec<TargetRef>,
    pub descriptor: ActionDescriptor,
    pub tags: Vec<String>,
    pub disabled: bool,
    pub payload: RegistrationPayload,
}

impl Registration {
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}

/// Fields shared by every finalized action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionHeader {
    /// Runtime target, after affixes
    pub target: Target,
    /// Author-declared target
    pub canonical_target: Target,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_descriptor: Option<ActionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(flatten)]
    pub header: ActionHeader,
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_ops: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_ops: Vec<String>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub incremental_where: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub protected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigquery: Option<BigQueryOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(flatten)]
    pub header: ActionHeader,
    pub queries: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_output: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    #[serde(flatten)]
    pub header: ActionHeader,
    pub query: String,
    /// Set for assertions generated from a table's inline `assertions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_action: Option<Target>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    #[serde(flatten)]
    pub header: ActionHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    #[serde(flatten)]
    pub header: ActionHeader,
    pub notebook_contents: String,
}

/// A finalized action of any variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Table(Table),
    Operation(Operation),
    Assertion(Assertion),
    Declaration(Declaration),
    Notebook(Notebook),
}

impl Action {
    pub fn header(&self) -> &ActionHeader {
        match self {
            Action::Table(a) => &a.header,
            Action::Operation(a) => &a.header,
            Action::Assertion(a) => &a.header,
            Action::Declaration(a) => &a.header,
            Action::Notebook(a) => &a.header,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Table(_) => ActionKind::Table,
            Action::Operation(_) => ActionKind::Operation,
            Action::Assertion(_) => ActionKind::Assertion,
            Action::Declaration(_) => ActionKind::Declaration,
            Action::Notebook(_) => ActionKind::Notebook,
        }
    }

    pub fn target(&self) -> &Target {
        &self.header().target
    }
}

/// A unit test as declared by one file execution.
///
/// The test query is the dataset's query with every reference replaced by
/// the matching input, so it is only built once the whole project has been
/// evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTestRegistration {
    pub file_path: String,
    pub name: String,
    pub dataset: Option<TargetRef>,
    /// Replacement query per referenced name
    pub inputs: BTreeMap<String, String>,
    pub expected_query: String,
}

impl UnitTestRegistration {
    pub fn new(name: &str, file_path: &str) -> CoreResult<Self> {
        if name.is_empty() {
            return Err(CoreError::EmptyName {
                context: format!("test declared in {}", file_path),
            });
        }
        Ok(Self {
            file_path: file_path.to_string(),
            name: name.to_string(),
            dataset: None,
            inputs: BTreeMap::new(),
            expected_query: String::new(),
        })
    }

    /// Apply `type`, `name` and `dataset`. Tags and dependencies are
    /// accepted and ignored; any other key is an error.
    pub fn apply_config(&mut self, config: ActionConfig) -> CoreResult<()> {
        let unused = config.keys_unused_by_tests();
        if let Some(key) = unused.first() {
            return Err(CoreError::InvalidActionConfig {
                name: self.name.clone(),
                message: format!(
                    "Unexpected property \"{}\" in test config. Supported properties are: type, dataset, name, tags, dependencies",
                    key
                ),
            });
        }
        if let Some(config_type) = config.config_type {
            if config_type != ConfigType::Test {
                return Err(CoreError::InvalidActionConfig {
                    name: self.name.clone(),
                    message: format!("type {:?} cannot be used on a test", config_type),
                });
            }
        }
        if let Some(name) = config.name {
            if name.is_empty() {
                return Err(CoreError::EmptyName {
                    context: format!("test declared in {}", self.file_path),
                });
            }
            self.name = name;
        }
        if let Some(dataset) = config.dataset {
            self.dataset = Some(dataset.into());
        }
        Ok(())
    }

    /// Set or replace the input standing in for references to `name`
    pub fn set_input(&mut self, name: &str, query: String) {
        self.inputs.insert(name.to_string(), query);
    }

    /// The input for a reference found in the dataset's query
    pub fn input_for(&self, reference: &TargetRef) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(name, _)| TargetRef::parse(name) == *reference)
            .map(|(_, query)| query.as_str())
    }
}

/// A finalized unit test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTest {
    pub name: String,
    pub file_name: String,
    #[serde(default)]
    pub test_query: String,
    #[serde(default)]
    pub expected_output_query: String,
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;
