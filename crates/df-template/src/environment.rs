//! Per-file Jinja environments for Dataforge.
//!
//! Every project file is evaluated in a fresh [`minijinja::Environment`]
//! that only knows the functions its action type may use. The environment
//! loads templates through a [`ProjectLoader`] and runs with a fuel limit, so
//! project code cannot read outside the project or loop forever.

use crate::capabilities::UnsupportedCapabilityPolicy;
use crate::context::{make_capability_fn, ActionContext};
use crate::error::{to_jinja_error, TemplateError, TemplateResult};
use crate::functions::{
    make_error_fn, make_from_json_fn, make_log_fn, make_to_json_fn, make_var_fn, make_warn_fn,
    WarningCapture,
};
use crate::handle::{make_action_fn, make_declare_fn, make_notebook_fn, make_test_fn, ScriptApi};
use crate::loader::ProjectLoader;
use df_core::path::{base_filename, variable_name_friendly};
use df_core::{ActionBuilder, ActionKind, Registration, TableType, UnitTestRegistration};
use df_sqlx::program::{LITERALS_VAR, SECTION_FILTER};
use df_sqlx::{Program, Section, SqlProgram, LEGACY_BINDINGS};
use minijinja::{AutoEscape, Environment, Error, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Instruction budget for one file
pub const DEFAULT_FUEL: u64 = 10_000_000;

/// Settings shared by every file of one compile
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub vars: BTreeMap<String, String>,
    pub policy: UnsupportedCapabilityPolicy,
    pub fuel: Option<u64>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            vars: BTreeMap::new(),
            policy: UnsupportedCapabilityPolicy::default(),
            fuel: Some(DEFAULT_FUEL),
        }
    }
}

/// What one file produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileOutput {
    pub registrations: Vec<Registration>,
    pub tests: Vec<UnitTestRegistration>,
    pub warnings: Vec<String>,
}

/// Captured sections, in render order
type SectionCapture = Arc<Mutex<Vec<(Section, String)>>>;

/// Create the `section(name)` filter that captures its input.
///
/// Returns an empty string; the text only lives in the capture.
fn make_section_filter(
    capture: SectionCapture,
) -> impl Fn(String, &str) -> Result<String, Error> + Send + Sync + Clone + 'static {
    move |value: String, name: &str| {
        let section = Section::from_name(name)
            .ok_or_else(|| to_jinja_error(format!("unknown section '{}'", name)))?;
        capture
            .lock()
            .map_err(|e| to_jinja_error(format!("section mutex poisoned: {e}")))?
            .push((section, value.trim().to_string()));
        Ok(String::new())
    }
}

/// Factory for the sandboxed environment of each project file
#[derive(Debug, Clone)]
pub struct SandboxEnvironment {
    loader: ProjectLoader,
    options: TemplateOptions,
    /// `(alias, path)` of every include imported into definitions
    imports: Vec<(String, String)>,
}

impl SandboxEnvironment {
    pub fn new(project_dir: impl Into<PathBuf>, options: TemplateOptions) -> Self {
        Self {
            loader: ProjectLoader::new(project_dir),
            options,
            imports: Vec::new(),
        }
    }

    pub fn loader(&self) -> &ProjectLoader {
        &self.loader
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Import an include into every definition evaluated from now on.
    ///
    /// The alias is the include's base file name, made variable friendly.
    pub fn add_import(&mut self, include_path: &str) -> String {
        let alias = variable_name_friendly(base_filename(include_path));
        self.imports.push((alias.clone(), include_path.to_string()));
        alias
    }

    pub fn imports(&self) -> &[(String, String)] {
        &self.imports
    }

    /// Evaluate an include on its own to check that it can be imported
    pub fn probe_include(&self, include_path: &str, source: &str) -> TemplateResult<Vec<String>> {
        let warnings = WarningCapture::default();
        let mut env = self.base_environment(include_path, warnings.clone());
        env.add_template_owned(include_path.to_string(), source.to_string())?;
        env.get_template(include_path)?.render(())?;
        let warnings = take(&warnings)?;
        Ok(warnings)
    }

    /// Evaluate one compiled definition file
    pub fn run(&self, program: &Program) -> TemplateResult<FileOutput> {
        match program {
            Program::Script { file_path, source } => self.run_script(file_path, source),
            Program::Sql(sql) => self.run_sql(sql),
        }
    }

    /// A fresh environment with the helpers every file gets
    fn base_environment(&self, file_path: &str, warnings: WarningCapture) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_: &str| AutoEscape::None);
        env.set_fuel(self.options.fuel);
        let loader = self.loader.clone();
        env.set_loader(move |name: &str| loader.load(name));

        env.add_function("var", make_var_fn(self.options.vars.clone()));
        env.add_function("log", make_log_fn(file_path.to_string()));
        env.add_function("error", make_error_fn());
        env.add_function("warn", make_warn_fn(warnings));
        env.add_function("from_json", make_from_json_fn());
        env.add_function("to_json", make_to_json_fn());
        env.add_filter("to_json", make_to_json_fn());
        env
    }

    /// `import` statements for every working include
    fn prelude(&self) -> String {
        self.imports
            .iter()
            .map(|(alias, path)| format!("{{%- import \"{}\" as {} -%}}\n", path, alias))
            .collect()
    }

    fn run_script(&self, file_path: &str, source: &str) -> TemplateResult<FileOutput> {
        let warnings = WarningCapture::default();
        let mut env = self.base_environment(file_path, warnings.clone());
        let api = ScriptApi::new(
            file_path,
            self.options.policy,
            warnings.clone(),
            self.loader.clone(),
        );
        env.add_function("publish", make_action_fn(ActionKind::Table, "publish", api.clone()));
        env.add_function("operate", make_action_fn(ActionKind::Operation, "operate", api.clone()));
        env.add_function("assert", make_action_fn(ActionKind::Assertion, "assert", api.clone()));
        env.add_function("declare", make_declare_fn(api.clone()));
        env.add_function("notebook", make_notebook_fn(api.clone()));
        env.add_function("test", make_test_fn(api.clone()));

        let template = format!("{}{}", self.prelude(), source);
        env.add_template_owned(file_path.to_string(), template)?;
        let output = env.get_template(file_path)?.render(())?;
        if !output.trim().is_empty() {
            log::debug!("{} rendered text outside any action; ignored", file_path);
        }

        Ok(FileOutput {
            registrations: api.finish()?,
            tests: api.finish_tests()?,
            warnings: take(&warnings)?,
        })
    }

    fn run_sql(&self, program: &SqlProgram) -> TemplateResult<FileOutput> {
        let Some(kind) = program.config_type.kind() else {
            return self.run_sql_test(program);
        };
        let mut builder = ActionBuilder::new(kind, &program.name, &program.file_path)?;
        match &program.config {
            Some(config) => builder.apply_config(config.clone())?,
            None => {
                if let Some(table_type) = program.config_type.table_type() {
                    builder.set_type(table_type)?;
                }
            }
        }

        let warnings = WarningCapture::default();
        let ctx = Arc::new(ActionContext::new(
            builder,
            false,
            self.options.policy,
            warnings.clone(),
        ));
        let sections = self.render_sections(program, Some(ctx.clone()), warnings.clone())?;
        let mut builder = ctx.snapshot()?;

        if builder.kind() == ActionKind::Table && builder.table_type() == TableType::Incremental {
            // Side effects of the second pass go to a throwaway copy
            let throwaway = WarningCapture::default();
            let incremental_ctx = Arc::new(ActionContext::new(
                builder.clone(),
                true,
                self.options.policy,
                throwaway.clone(),
            ));
            let incremental = self.render_sections(program, Some(incremental_ctx), throwaway)?;
            let query = incremental
                .into_iter()
                .find(|(section, _)| *section == Section::Query)
                .map(|(_, text)| text)
                .unwrap_or_default();
            builder.set_incremental_query(query)?;
        }

        for (section, text) in sections {
            match (section, builder.kind()) {
                (Section::Query, ActionKind::Operation) => builder.add_query(text)?,
                (Section::Query, ActionKind::Table | ActionKind::Assertion) => {
                    builder.set_query(text)?
                }
                (Section::Query, _) => {}
                (Section::PreOps, _) if !text.is_empty() => builder.add_pre_op(text)?,
                (Section::PostOps, _) if !text.is_empty() => builder.add_post_op(text)?,
                (Section::Where, _) if !text.is_empty() => builder.set_where(text)?,
                _ => {}
            }
        }

        Ok(FileOutput {
            registrations: vec![builder.finish()?],
            tests: Vec::new(),
            warnings: take(&warnings)?,
        })
    }

    /// A SQLX unit test: the query is the expected output and each `input`
    /// block stands in for one reference of the dataset
    fn run_sql_test(&self, program: &SqlProgram) -> TemplateResult<FileOutput> {
        let mut test = UnitTestRegistration::new(&program.name, &program.file_path)?;
        if let Some(config) = &program.config {
            test.apply_config(config.clone())?;
        }

        let warnings = WarningCapture::default();
        let sections = self.render_sections(program, None, warnings.clone())?;
        let mut input_names = program.input_names.iter();
        for (section, text) in sections {
            match section {
                Section::Query => test.expected_query = text,
                Section::Input => {
                    if let Some(name) = input_names.next() {
                        test.set_input(name, text);
                    }
                }
                _ => {}
            }
        }

        Ok(FileOutput {
            registrations: Vec::new(),
            tests: vec![test],
            warnings: take(&warnings)?,
        })
    }

    /// Render a SQL program once and return what its sections captured.
    /// Without an action context no capability is bound.
    fn render_sections(
        &self,
        program: &SqlProgram,
        ctx: Option<Arc<ActionContext>>,
        warnings: WarningCapture,
    ) -> TemplateResult<Vec<(Section, String)>> {
        let mut env = self.base_environment(&program.file_path, warnings);
        if let Some(ctx) = ctx {
            for binding in LEGACY_BINDINGS {
                env.add_function(*binding, make_capability_fn(*binding, ctx.clone()));
            }
        }
        let capture = SectionCapture::default();
        env.add_filter(SECTION_FILTER, make_section_filter(capture.clone()));

        let template = format!("{}{}", self.prelude(), program.template);
        env.add_template_owned(program.file_path.clone(), template)?;
        let render_ctx = Value::from_iter([(
            LITERALS_VAR,
            Value::from_serialize(&program.literals),
        )]);
        env.get_template(&program.file_path)?.render(render_ctx)?;

        let sections = capture
            .lock()
            .map_err(|e| TemplateError::Internal(format!("section mutex poisoned: {e}")))?
            .clone();
        Ok(sections)
    }
}

fn take(capture: &WarningCapture) -> TemplateResult<Vec<String>> {
    capture
        .lock()
        .map(|mut w| std::mem::take(&mut *w))
        .map_err(|e| TemplateError::Internal(format!("warning mutex poisoned: {e}")))
}

#[cfg(test)]
#[path = "environment_test.rs"]
mod tests;
