//! The compiled graph: the immutable artifact of one compile.

use crate::action::{Action, Assertion, Declaration, Notebook, Operation, Table, UnitTest};
use crate::checksum::compute_checksum;
use crate::error::CoreResult;
use crate::settings::ProjectConfig;
use crate::target::Target;
use serde::{Deserialize, Serialize};

/// A file failed while being evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationError {
    pub file_name: String,
    pub message: String,
}

/// A graph-level semantic problem found after evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub file_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_target: Option<Target>,
}

/// Something suspicious that does not make the graph unsafe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphWarning {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphErrors {
    #[serde(default)]
    pub compilation_errors: Vec<CompilationError>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<GraphWarning>,
}

impl GraphErrors {
    /// True if the graph must not be executed
    pub fn is_fatal(&self) -> bool {
        !self.compilation_errors.is_empty() || !self.validation_errors.is_empty()
    }
}

/// All finalized actions grouped by variant, plus config and errors.
///
/// Every list is sorted by target so that identical sources always produce
/// byte-identical serialized graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGraph {
    pub dataform_core_version: String,
    pub project_config: ProjectConfig,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub notebooks: Vec<Notebook>,
    /// Unit tests, sorted by name
    #[serde(default)]
    pub tests: Vec<UnitTest>,
    pub graph_errors: GraphErrors,
}

impl CompiledGraph {
    /// Group finalized actions into a graph
    pub fn assemble(
        core_version: &str,
        project_config: ProjectConfig,
        actions: Vec<Action>,
        graph_errors: GraphErrors,
    ) -> Self {
        let mut graph = Self {
            dataform_core_version: core_version.to_string(),
            project_config,
            tables: Vec::new(),
            operations: Vec::new(),
            assertions: Vec::new(),
            declarations: Vec::new(),
            notebooks: Vec::new(),
            tests: Vec::new(),
            graph_errors,
        };
        for action in actions {
            match action {
                Action::Table(a) => graph.tables.push(a),
                Action::Operation(a) => graph.operations.push(a),
                Action::Assertion(a) => graph.assertions.push(a),
                Action::Declaration(a) => graph.declarations.push(a),
                Action::Notebook(a) => graph.notebooks.push(a),
            }
        }
        graph.tables.sort_by(|a, b| sort_key(&a.header).cmp(&sort_key(&b.header)));
        graph.operations.sort_by(|a, b| sort_key(&a.header).cmp(&sort_key(&b.header)));
        graph.assertions.sort_by(|a, b| sort_key(&a.header).cmp(&sort_key(&b.header)));
        graph.declarations.sort_by(|a, b| sort_key(&a.header).cmp(&sort_key(&b.header)));
        graph.notebooks.sort_by(|a, b| sort_key(&a.header).cmp(&sort_key(&b.header)));
        graph
    }

    /// Attach unit tests, ordered by name then file
    pub fn with_tests(mut self, mut tests: Vec<UnitTest>) -> Self {
        tests.sort_by(|a, b| (&a.name, &a.file_name).cmp(&(&b.name, &b.file_name)));
        self.tests = tests;
        self
    }

    /// Compact JSON encoding, as sent across the worker boundary
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(encoded: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(encoded)?)
    }

    /// SHA-256 of the compact encoding
    pub fn fingerprint(&self) -> CoreResult<String> {
        Ok(compute_checksum(self.to_json()?))
    }

    pub fn action_count(&self) -> usize {
        self.tables.len()
            + self.operations.len()
            + self.assertions.len()
            + self.declarations.len()
            + self.notebooks.len()
    }

    /// Runtime targets of every action, in graph order
    pub fn targets(&self) -> Vec<&Target> {
        self.tables
            .iter()
            .map(|a| &a.header.target)
            .chain(self.operations.iter().map(|a| &a.header.target))
            .chain(self.assertions.iter().map(|a| &a.header.target))
            .chain(self.declarations.iter().map(|a| &a.header.target))
            .chain(self.notebooks.iter().map(|a| &a.header.target))
            .collect()
    }
}

fn sort_key(header: &crate::action::ActionHeader) -> (&Target, &str) {
    (&header.target, header.file_name.as_str())
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
