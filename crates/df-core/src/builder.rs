//! Mutable per-action builder with an explicit lifecycle.
//!
//! A builder is created when project code declares an action, receives any
//! number of fluent configuration calls, and is finished exactly once into a
//! [`Registration`]. After that every mutation is rejected.

use crate::action::{
    ActionConfig, ActionDescriptor, ActionKind, BigQueryOptions, ColumnDoc, ConfigType,
    Registration, RegistrationPayload, TableAssertions, TableType,
};
use crate::error::{CoreError, CoreResult};
use crate::target::TargetRef;

/// Lifecycle of a single action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Constructor called, nothing configured yet
    Declared,
    /// At least one configuration call applied
    Configured,
    /// Finished into a registration; terminal
    Compiled,
}

#[derive(Debug, Clone)]
pub struct ActionBuilder {
    state: BuilderState,
    kind: ActionKind,
    file_path: String,
    name: String,
    schema: Option<String>,
    database: Option<String>,
    table_type: TableType,
    descriptor: ActionDescriptor,
    tags: Vec<String>,
    disabled: bool,
    dependencies: Vec<TargetRef>,
    query: Option<String>,
    incremental_query: Option<String>,
    queries: Vec<String>,
    pre_ops: Vec<String>,
    post_ops: Vec<String>,
    incremental_where: Option<String>,
    protected: bool,
    has_output: bool,
    unique_key: Vec<String>,
    assertions: TableAssertions,
    bigquery: Option<BigQueryOptions>,
    notebook_contents: Option<String>,
}

impl ActionBuilder {
    /// Declare a new action
    pub fn new(kind: ActionKind, name: &str, file_path: &str) -> CoreResult<Self> {
        if name.is_empty() {
            return Err(CoreError::EmptyName {
                context: format!("{} declared in {}", kind, file_path),
            });
        }
        Ok(Self {
            state: BuilderState::Declared,
            kind,
            file_path: file_path.to_string(),
            name: name.to_string(),
            schema: None,
            database: None,
            table_type: TableType::default(),
            descriptor: ActionDescriptor::default(),
            tags: Vec::new(),
            disabled: false,
            dependencies: Vec::new(),
            query: None,
            incremental_query: None,
            queries: Vec::new(),
            pre_ops: Vec::new(),
            post_ops: Vec::new(),
            incremental_where: None,
            protected: false,
            has_output: false,
            unique_key: Vec::new(),
            assertions: TableAssertions::default(),
            bigquery: None,
            notebook_contents: None,
        })
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    fn touch(&mut self) -> CoreResult<()> {
        match self.state {
            BuilderState::Compiled => Err(CoreError::ActionSealed {
                name: self.name.clone(),
            }),
            _ => {
                self.state = BuilderState::Configured;
                Ok(())
            }
        }
    }

    fn invalid(&self, message: impl Into<String>) -> CoreError {
        CoreError::InvalidActionConfig {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// Apply every key present in `config`
    pub fn apply_config(&mut self, config: ActionConfig) -> CoreResult<()> {
        self.touch()?;
        if config.dataset.is_some() {
            return Err(self.invalid(
                "Actions may only specify 'dataset' if they are of type 'test'.",
            ));
        }
        if let Some(config_type) = config.config_type {
            self.apply_config_type(config_type)?;
        }
        if let Some(name) = config.name {
            if name.is_empty() {
                return Err(self.invalid("name cannot be empty"));
            }
            self.name = name;
        }
        if let Some(schema) = config.schema {
            self.schema = Some(schema);
        }
        if let Some(database) = config.database {
            self.database = Some(database);
        }
        if let Some(description) = config.description {
            self.descriptor.description = Some(description);
        }
        if let Some(columns) = config.columns {
            self.descriptor.columns.extend(columns);
        }
        if let Some(tags) = config.tags {
            self.tags.extend(tags);
        }
        if let Some(deps) = config.dependencies {
            self.dependencies
                .extend(deps.into_iter().map(TargetRef::from));
        }
        if let Some(disabled) = config.disabled {
            self.disabled = disabled;
        }
        if let Some(protected) = config.protected {
            self.protected = protected;
        }
        if let Some(has_output) = config.has_output {
            self.has_output = has_output;
        }
        if let Some(unique_key) = config.unique_key {
            self.unique_key = unique_key;
        }
        if let Some(assertions) = config.assertions {
            self.assertions = assertions;
        }
        if let Some(bigquery) = config.bigquery {
            self.bigquery = Some(bigquery);
        }
        Ok(())
    }

    fn apply_config_type(&mut self, config_type: ConfigType) -> CoreResult<()> {
        if config_type.kind() != Some(self.kind) {
            return Err(self.invalid(format!(
                "type {:?} cannot be used on a {}",
                config_type, self.kind
            )));
        }
        if let Some(table_type) = config_type.table_type() {
            self.table_type = table_type;
        }
        Ok(())
    }

    /// Set the materialization of a table
    pub fn set_type(&mut self, table_type: TableType) -> CoreResult<()> {
        self.touch()?;
        if self.kind != ActionKind::Table {
            return Err(self.invalid(format!("a {} has no table type", self.kind)));
        }
        self.table_type = table_type;
        Ok(())
    }

    pub fn set_query(&mut self, query: String) -> CoreResult<()> {
        self.touch()?;
        self.query = Some(query);
        Ok(())
    }

    pub fn set_incremental_query(&mut self, query: String) -> CoreResult<()> {
        self.touch()?;
        self.incremental_query = Some(query);
        Ok(())
    }

    /// Append one statement to an operation
    pub fn add_query(&mut self, query: String) -> CoreResult<()> {
        self.touch()?;
        self.queries.push(query);
        Ok(())
    }

    pub fn add_dependency(&mut self, dependency: TargetRef) -> CoreResult<()> {
        self.touch()?;
        self.dependencies.push(dependency);
        Ok(())
    }

    pub fn set_schema(&mut self, schema: String) -> CoreResult<()> {
        self.touch()?;
        self.schema = Some(schema);
        Ok(())
    }

    pub fn set_database(&mut self, database: String) -> CoreResult<()> {
        self.touch()?;
        self.database = Some(database);
        Ok(())
    }

    pub fn set_description(&mut self, description: String) -> CoreResult<()> {
        self.touch()?;
        self.descriptor.description = Some(description);
        Ok(())
    }

    pub fn set_column(&mut self, column: String, doc: ColumnDoc) -> CoreResult<()> {
        self.touch()?;
        self.descriptor.columns.insert(column, doc);
        Ok(())
    }

    pub fn add_tags(&mut self, tags: Vec<String>) -> CoreResult<()> {
        self.touch()?;
        self.tags.extend(tags);
        Ok(())
    }

    pub fn set_disabled(&mut self, disabled: bool) -> CoreResult<()> {
        self.touch()?;
        self.disabled = disabled;
        Ok(())
    }

    pub fn add_pre_op(&mut self, statement: String) -> CoreResult<()> {
        self.touch()?;
        self.pre_ops.push(statement);
        Ok(())
    }

    pub fn add_post_op(&mut self, statement: String) -> CoreResult<()> {
        self.touch()?;
        self.post_ops.push(statement);
        Ok(())
    }

    pub fn set_where(&mut self, clause: String) -> CoreResult<()> {
        self.touch()?;
        self.incremental_where = Some(clause);
        Ok(())
    }

    pub fn set_protected(&mut self, protected: bool) -> CoreResult<()> {
        self.touch()?;
        self.protected = protected;
        Ok(())
    }

    pub fn set_has_output(&mut self, has_output: bool) -> CoreResult<()> {
        self.touch()?;
        if self.kind != ActionKind::Operation {
            return Err(self.invalid("hasOutput is only valid for operations"));
        }
        self.has_output = has_output;
        Ok(())
    }

    pub fn set_unique_key(&mut self, unique_key: Vec<String>) -> CoreResult<()> {
        self.touch()?;
        self.unique_key = unique_key;
        Ok(())
    }

    pub fn set_bigquery(&mut self, options: BigQueryOptions) -> CoreResult<()> {
        self.touch()?;
        self.bigquery = Some(options);
        Ok(())
    }

    pub fn set_notebook_contents(&mut self, contents: String) -> CoreResult<()> {
        self.touch()?;
        self.notebook_contents = Some(contents);
        Ok(())
    }

    /// Finish the action. This is the only transition into `Compiled`.
    pub fn finish(&mut self) -> CoreResult<Registration> {
        if self.state == BuilderState::Compiled {
            return Err(CoreError::ActionSealed {
                name: self.name.clone(),
            });
        }
        let payload = match self.kind {
            ActionKind::Table => RegistrationPayload::Table {
                table_type: self.table_type,
                query: self
                    .query
                    .clone()
                    .ok_or_else(|| self.invalid("table has no query"))?,
                incremental_query: self.incremental_query.clone(),
                pre_ops: self.pre_ops.clone(),
                post_ops: self.post_ops.clone(),
                incremental_where: self.incremental_where.clone(),
                protected: self.protected,
                unique_key: self.unique_key.clone(),
                assertions: self.assertions.clone(),
                bigquery: self.bigquery.clone(),
            },
            ActionKind::Operation => RegistrationPayload::Operation {
                queries: self.queries.clone(),
                has_output: self.has_output,
            },
            ActionKind::Assertion => RegistrationPayload::Assertion {
                query: self
                    .query
                    .clone()
                    .ok_or_else(|| self.invalid("assertion has no query"))?,
            },
            ActionKind::Declaration => RegistrationPayload::Declaration,
            ActionKind::Notebook => RegistrationPayload::Notebook {
                contents: self
                    .notebook_contents
                    .clone()
                    .ok_or_else(|| self.invalid("notebook has no contents"))?,
            },
        };
        self.state = BuilderState::Compiled;
        Ok(Registration {
            file_path: self.file_path.clone(),
            name: self.name.clone(),
            schema: self.schema.clone(),
            database: self.database.clone(),
            dependencies: self.dependencies.clone(),
            descriptor: self.descriptor.clone(),
            tags: self.tags.clone(),
            disabled: self.disabled,
            payload,
        })
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
