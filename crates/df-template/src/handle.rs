//! Script API: `publish`, `operate`, `assert`, `declare`, `notebook` and
//! `test`.
//!
//! Each action creation function returns an [`ActionHandle`] whose methods
//! configure the action fluently and return the handle again:
//!
//! ```jinja
//! {{ publish("orders", {"type": "view"}).dependencies(["raw_orders"]).query("select 1") }}
//! ```
//!
//! Queries may be given as a string or as a macro taking the action context.
//! Macros are called immediately, so `type`/`config` must come before
//! `query` for the macro to see them.
//!
//! `test` returns a [`TestHandle`] instead:
//!
//! ```jinja
//! {{ test("orders_test").dataset("orders").input("raw_orders", "select 1 as id").expect("select 1 as id") }}
//! ```

use crate::capabilities::UnsupportedCapabilityPolicy;
use crate::context::{from_value, merged_map_arg, target_ref, ActionContext, ContextObject};
use crate::error::{to_jinja_error, TemplateError, TemplateResult};
use crate::functions::{flag_arg, minijinja_value_to_json, string_arg, string_list, WarningCapture};
use crate::loader::ProjectLoader;
use df_core::path::{dir_name, join};
use df_core::{
    ActionBuilder, ActionConfig, ActionKind, ColumnDoc, CoreResult, Registration, TableType,
    TargetRef, UnitTestRegistration,
};
use minijinja::value::{Object, ObjectRepr, Rest, Value, ValueKind};
use minijinja::{Error, State};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared state behind the creation functions of one script file
#[derive(Debug, Clone)]
pub(crate) struct ScriptApi {
    file_path: String,
    policy: UnsupportedCapabilityPolicy,
    warnings: WarningCapture,
    loader: ProjectLoader,
    actions: Arc<Mutex<Vec<Arc<ActionContext>>>>,
    tests: Arc<Mutex<Vec<SharedTest>>>,
}

type SharedTest = Arc<Mutex<UnitTestRegistration>>;

impl ScriptApi {
    pub(crate) fn new(
        file_path: &str,
        policy: UnsupportedCapabilityPolicy,
        warnings: WarningCapture,
        loader: ProjectLoader,
    ) -> Self {
        Self {
            file_path: file_path.to_string(),
            policy,
            warnings,
            loader,
            actions: Arc::new(Mutex::new(Vec::new())),
            tests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn declare_action(&self, builder: ActionBuilder) -> Result<Value, Error> {
        let ctx = Arc::new(ActionContext::new(
            builder,
            false,
            self.policy,
            self.warnings.clone(),
        ));
        self.actions
            .lock()
            .map_err(|e| to_jinja_error(format!("action list mutex poisoned: {e}")))?
            .push(ctx.clone());
        Ok(Value::from_object(ActionHandle { ctx }))
    }

    /// Finish every action the script declared, in declaration order
    pub(crate) fn finish(&self) -> TemplateResult<Vec<Registration>> {
        let actions = self
            .actions
            .lock()
            .map_err(|e| TemplateError::Internal(format!("action list mutex poisoned: {e}")))?;
        actions.iter().map(|ctx| ctx.finish()).collect()
    }

    fn declare_test(&self, test: UnitTestRegistration) -> Result<Value, Error> {
        let test = Arc::new(Mutex::new(test));
        self.tests
            .lock()
            .map_err(|e| to_jinja_error(format!("test list mutex poisoned: {e}")))?
            .push(test.clone());
        Ok(Value::from_object(TestHandle { test }))
    }

    /// Every test the script declared, in declaration order
    pub(crate) fn finish_tests(&self) -> TemplateResult<Vec<UnitTestRegistration>> {
        let tests = self
            .tests
            .lock()
            .map_err(|e| TemplateError::Internal(format!("test list mutex poisoned: {e}")))?;
        tests
            .iter()
            .map(|test| {
                test.lock()
                    .map(|t| t.clone())
                    .map_err(|e| TemplateError::Internal(format!("test mutex poisoned: {e}")))
            })
            .collect()
    }
}

/// Split a `{"name": ..., ...}` argument into the name and the rest
fn name_and_config(
    value: &Value,
    what: &str,
) -> Result<(String, serde_json::Map<String, serde_json::Value>), Error> {
    if let Some(name) = value.as_str() {
        return Ok((name.to_string(), serde_json::Map::new()));
    }
    match minijinja_value_to_json(value) {
        serde_json::Value::Object(mut map) => match map.remove("name") {
            Some(serde_json::Value::String(name)) => Ok((name, map)),
            _ => Err(to_jinja_error(format!("{}() requires a name", what))),
        },
        _ => Err(to_jinja_error(format!(
            "{}() expects a name or a config map",
            what
        ))),
    }
}

fn parse_config(
    map: serde_json::Map<String, serde_json::Value>,
    what: &str,
) -> Result<ActionConfig, Error> {
    serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| {
        to_jinja_error(TemplateError::InvalidConfig {
            message: format!("{}: {}", what, e),
        })
    })
}

/// Create `publish`, `operate` or `assert`.
///
/// The optional second argument is a config map, or the query text.
pub(crate) fn make_action_fn(
    kind: ActionKind,
    what: &'static str,
    api: ScriptApi,
) -> impl Fn(Rest<Value>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |args: Rest<Value>| {
        let first = args
            .first()
            .ok_or_else(|| to_jinja_error(format!("{}() requires a name", what)))?;
        let (name, config) = name_and_config(first, what)?;
        let mut builder =
            ActionBuilder::new(kind, &name, &api.file_path).map_err(to_jinja_error)?;
        if !config.is_empty() {
            builder
                .apply_config(parse_config(config, what)?)
                .map_err(to_jinja_error)?;
        }
        match args.get(1) {
            Some(second) if second.kind() == ValueKind::Map => {
                let config: ActionConfig = from_value(second, what)?;
                builder.apply_config(config).map_err(to_jinja_error)?;
            }
            Some(second) => {
                for query in string_list(second)? {
                    set_query(&mut builder, query.trim().to_string()).map_err(to_jinja_error)?;
                }
            }
            None => {}
        }
        api.declare_action(builder)
    }
}

/// Create `declare(name)` / `declare({"schema": ..., "name": ...})`
pub(crate) fn make_declare_fn(
    api: ScriptApi,
) -> impl Fn(Value) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |target: Value| {
        let (name, config) = name_and_config(&target, "declare")?;
        let mut builder = ActionBuilder::new(ActionKind::Declaration, &name, &api.file_path)
            .map_err(to_jinja_error)?;
        if !config.is_empty() {
            builder
                .apply_config(parse_config(config, "declare")?)
                .map_err(to_jinja_error)?;
        }
        api.declare_action(builder)
    }
}

/// Create `notebook(name, filename)` / `notebook({"name": ..., "filename": ...})`.
///
/// The file is resolved against the script's directory and read through the
/// project loader. Cell outputs are stripped.
pub(crate) fn make_notebook_fn(
    api: ScriptApi,
) -> impl Fn(Value, Option<String>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |spec: Value, filename: Option<String>| {
        let (name, mut config) = name_and_config(&spec, "notebook")?;
        let filename = match config.remove("filename") {
            Some(serde_json::Value::String(f)) => f,
            _ => filename.ok_or_else(|| to_jinja_error("notebook() requires a filename"))?,
        };
        let path = join(dir_name(&api.file_path), &filename);
        let contents = load_notebook(&api.loader, &path).map_err(to_jinja_error)?;

        let mut builder = ActionBuilder::new(ActionKind::Notebook, &name, &api.file_path)
            .map_err(to_jinja_error)?;
        if !config.is_empty() {
            builder
                .apply_config(parse_config(config, "notebook")?)
                .map_err(to_jinja_error)?;
        }
        builder
            .set_notebook_contents(contents)
            .map_err(to_jinja_error)?;
        api.declare_action(builder)
    }
}

/// Create `test(name)` / `test({"name": ..., "dataset": ...})`
pub(crate) fn make_test_fn(
    api: ScriptApi,
) -> impl Fn(Value) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |spec: Value| {
        let (name, config) = name_and_config(&spec, "test")?;
        let mut test = UnitTestRegistration::new(&name, &api.file_path).map_err(to_jinja_error)?;
        if !config.is_empty() {
            test.apply_config(parse_config(config, "test")?)
                .map_err(to_jinja_error)?;
        }
        api.declare_test(test)
    }
}

/// Read an `.ipynb` file and drop every cell's outputs
pub(crate) fn load_notebook(loader: &ProjectLoader, path: &str) -> TemplateResult<String> {
    let invalid = |message: String| TemplateError::InvalidNotebook {
        path: path.to_string(),
        message,
    };
    let raw = loader
        .read(path)?
        .ok_or_else(|| invalid("file not found".to_string()))?;
    let mut notebook: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
    let cells = notebook
        .get_mut("cells")
        .and_then(|c| c.as_array_mut())
        .ok_or_else(|| invalid("notebook has no cells".to_string()))?;
    for cell in cells.iter_mut() {
        if let Some(outputs) = cell.get_mut("outputs") {
            *outputs = serde_json::Value::Array(Vec::new());
        }
    }
    serde_json::to_string(&notebook).map_err(|e| invalid(e.to_string()))
}

fn set_query(builder: &mut ActionBuilder, query: String) -> CoreResult<()> {
    match builder.kind() {
        ActionKind::Operation => builder.add_query(query),
        _ => builder.set_query(query),
    }
}

/// Fluent configuration of one script-declared action
#[derive(Debug)]
pub struct ActionHandle {
    ctx: Arc<ActionContext>,
}

impl ActionHandle {
    /// Evaluate a string-or-macro argument
    fn contextable(
        &self,
        state: &State<'_, '_>,
        value: &Value,
        ctx: Arc<ActionContext>,
    ) -> Result<Value, Error> {
        match value.kind() {
            ValueKind::String | ValueKind::Seq | ValueKind::None | ValueKind::Undefined => {
                Ok(value.clone())
            }
            _ => value.call(state, &[ContextObject::value(ctx)]),
        }
    }

    fn texts(&self, state: &State<'_, '_>, args: &[Value]) -> Result<Vec<String>, Error> {
        let mut texts = Vec::new();
        for arg in args {
            let value = self.contextable(state, arg, self.ctx.clone())?;
            texts.extend(string_list(&value)?.into_iter().map(|t| t.trim().to_string()));
        }
        Ok(texts)
    }

    fn query(&self, state: &State<'_, '_>, args: &[Value]) -> Result<(), Error> {
        if matches!(self.ctx.kind(), ActionKind::Declaration | ActionKind::Notebook) {
            return Err(to_jinja_error(format!("a {} has no query", self.ctx.kind())));
        }
        let value = args
            .first()
            .ok_or_else(|| to_jinja_error("query() requires an argument"))?;
        let rendered = self.contextable(state, value, self.ctx.clone())?;
        let queries: Vec<String> = string_list(&rendered)?
            .into_iter()
            .map(|q| q.trim().to_string())
            .collect();
        self.ctx
            .with_builder(|b| queries.into_iter().try_for_each(|q| set_query(b, q)))?;

        let incremental = self.ctx.kind() == ActionKind::Table
            && self
                .ctx
                .with_builder(|b| Ok(b.table_type() == TableType::Incremental))?;
        if incremental {
            let snapshot = self.ctx.snapshot().map_err(to_jinja_error)?;
            let throwaway = Arc::new(ActionContext::new(
                snapshot,
                true,
                self.ctx.policy(),
                WarningCapture::default(),
            ));
            let rendered = self.contextable(state, value, throwaway)?;
            let query = string_list(&rendered)?.join("\n");
            self.ctx
                .with_builder(|b| b.set_incremental_query(query.trim().to_string()))?;
        }
        Ok(())
    }

    fn configure(&self, state: &State<'_, '_>, method: &str, args: &[Value]) -> Result<(), Error> {
        match method {
            "query" => self.query(state, args),
            "queries" => {
                if self.ctx.kind() != ActionKind::Operation {
                    return Err(to_jinja_error("queries() is only available on operations"));
                }
                let queries = self.texts(state, args)?;
                self.ctx
                    .with_builder(|b| queries.into_iter().try_for_each(|q| b.add_query(q)))
            }
            "dependencies" => {
                let mut deps = Vec::new();
                for arg in args {
                    deps.extend(string_list(arg)?);
                }
                self.ctx.with_builder(|b| {
                    deps.iter()
                        .try_for_each(|d| b.add_dependency(TargetRef::parse(d)))
                })
            }
            "description" => {
                let text = string_arg(args, 0, "description()")?;
                self.ctx.with_builder(|b| b.set_description(text))
            }
            "columns" => {
                let value = args
                    .first()
                    .ok_or_else(|| to_jinja_error("columns() requires a map"))?;
                let columns: BTreeMap<String, ColumnDoc> = from_value(value, "columns")?;
                self.ctx.with_builder(|b| {
                    columns
                        .into_iter()
                        .try_for_each(|(column, doc)| b.set_column(column, doc))
                })
            }
            "tags" => {
                let mut tags = Vec::new();
                for arg in args {
                    tags.extend(string_list(arg)?);
                }
                self.ctx.with_builder(|b| b.add_tags(tags))
            }
            "disabled" => {
                let disabled = flag_arg(args, 0);
                self.ctx.with_builder(|b| b.set_disabled(disabled))
            }
            "type" => {
                let raw = string_arg(args, 0, "type()")?;
                let table_type = TableType::parse(&raw)
                    .ok_or_else(|| to_jinja_error(format!("unknown table type '{}'", raw)))?;
                self.ctx.with_builder(|b| b.set_type(table_type))
            }
            "schema" => {
                let schema = string_arg(args, 0, "schema()")?;
                self.ctx.with_builder(|b| b.set_schema(schema))
            }
            "database" => {
                let database = string_arg(args, 0, "database()")?;
                self.ctx.with_builder(|b| b.set_database(database))
            }
            "config" => {
                let config: ActionConfig = merged_map_arg(args, "config")?;
                self.ctx.with_builder(|b| b.apply_config(config))
            }
            "preOps" | "postOps" => {
                let statements = self.texts(state, args)?;
                let pre = method == "preOps";
                self.ctx.with_builder(|b| {
                    statements.into_iter().try_for_each(|s| {
                        if pre {
                            b.add_pre_op(s)
                        } else {
                            b.add_post_op(s)
                        }
                    })
                })
            }
            "where" => {
                let clause = self.texts(state, args)?.join("\n");
                self.ctx.with_builder(|b| b.set_where(clause))
            }
            "hasOutput" => {
                let has_output = flag_arg(args, 0);
                self.ctx.with_builder(|b| b.set_has_output(has_output))
            }
            "uniqueKey" => {
                let mut keys = Vec::new();
                for arg in args {
                    keys.extend(string_list(arg)?);
                }
                self.ctx.with_builder(|b| b.set_unique_key(keys))
            }
            "protected" => {
                let protected = flag_arg(args, 0);
                self.ctx.with_builder(|b| b.set_protected(protected))
            }
            other => Err(Error::new(
                minijinja::ErrorKind::UnknownMethod,
                format!("{} has no method named {}", self.ctx.kind(), other),
            )),
        }
    }
}

impl Object for ActionHandle {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        self.configure(state, method, args)?;
        Ok(Value::from_object(ActionHandle {
            ctx: self.ctx.clone(),
        }))
    }

    /// Handles print nothing, so `{{ publish(...) }}` can be used as a statement
    fn render(self: &Arc<Self>, _f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self: Sized + 'static,
    {
        Ok(())
    }
}

/// Fluent configuration of one script-declared unit test
#[derive(Debug)]
pub struct TestHandle {
    test: SharedTest,
}

impl TestHandle {
    fn with_test<T>(&self, f: impl FnOnce(&mut UnitTestRegistration) -> T) -> Result<T, Error> {
        let mut test = self
            .test
            .lock()
            .map_err(|e| to_jinja_error(format!("test mutex poisoned: {e}")))?;
        Ok(f(&mut test))
    }

    /// A query given as a string or as a macro taking no arguments
    fn text(&self, state: &State<'_, '_>, value: Option<&Value>, what: &str) -> Result<String, Error> {
        let value = value.ok_or_else(|| to_jinja_error(format!("{}() requires a query", what)))?;
        let rendered = match value.kind() {
            ValueKind::String => value.clone(),
            _ => value.call(state, &[])?,
        };
        Ok(rendered
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| rendered.to_string())
            .trim()
            .to_string())
    }

    fn configure(&self, state: &State<'_, '_>, method: &str, args: &[Value]) -> Result<(), Error> {
        match method {
            "dataset" => {
                let dataset = target_ref(args)?;
                self.with_test(|t| t.dataset = Some(dataset))
            }
            "input" => {
                let name = string_arg(args, 0, "input()")?;
                let query = self.text(state, args.get(1), "input")?;
                self.with_test(|t| t.set_input(&name, query))
            }
            "expect" => {
                let query = self.text(state, args.first(), "expect")?;
                self.with_test(|t| t.expected_query = query)
            }
            "config" => {
                let config: ActionConfig = merged_map_arg(args, "config")?;
                self.with_test(|t| t.apply_config(config))?
                    .map_err(to_jinja_error)
            }
            other => Err(Error::new(
                minijinja::ErrorKind::UnknownMethod,
                format!("test has no method named {}", other),
            )),
        }
    }
}

impl Object for TestHandle {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        self.configure(state, method, args)?;
        Ok(Value::from_object(TestHandle {
            test: self.test.clone(),
        }))
    }

    fn render(self: &Arc<Self>, _f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self: Sized + 'static,
    {
        Ok(())
    }
}

#[cfg(test)]
#[path = "handle_test.rs"]
mod tests;
