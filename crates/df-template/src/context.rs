//! The action context: the functions project code calls while one action is
//! being defined.
//!
//! A context owns the action's builder. Every bound name funnels through
//! [`ActionContext::invoke`], which checks the capability table for the
//! action type before doing anything.

use crate::capabilities::{is_supported, UnsupportedCapabilityPolicy};
use crate::error::{to_jinja_error, TemplateError, TemplateResult};
use crate::functions::{
    flag_arg, minijinja_value_to_json, push_warning, string_arg, string_list, WarningCapture,
};
use df_core::action::BigQueryOptions;
use df_core::{
    ActionBuilder, ActionConfig, ActionKind, ColumnDoc, CoreResult, Deferred, Registration,
    TableType, TargetRef,
};
use minijinja::value::{Object, ObjectRepr, Rest, Value, ValueKind};
use minijinja::{Error, State};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Per-action state shared by every function bound for that action
#[derive(Debug)]
pub struct ActionContext {
    file_path: String,
    kind: ActionKind,
    incremental: bool,
    policy: UnsupportedCapabilityPolicy,
    builder: Mutex<ActionBuilder>,
    warnings: WarningCapture,
}

impl ActionContext {
    pub(crate) fn new(
        builder: ActionBuilder,
        incremental: bool,
        policy: UnsupportedCapabilityPolicy,
        warnings: WarningCapture,
    ) -> Self {
        Self {
            file_path: builder.file_path().to_string(),
            kind: builder.kind(),
            incremental,
            policy,
            builder: Mutex::new(builder),
            warnings,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub(crate) fn policy(&self) -> UnsupportedCapabilityPolicy {
        self.policy
    }

    pub(crate) fn warnings(&self) -> WarningCapture {
        self.warnings.clone()
    }

    /// Run a mutation against the builder
    pub(crate) fn with_builder<T>(
        &self,
        f: impl FnOnce(&mut ActionBuilder) -> CoreResult<T>,
    ) -> Result<T, Error> {
        let mut builder = self
            .builder
            .lock()
            .map_err(|e| to_jinja_error(format!("builder mutex poisoned: {e}")))?;
        f(&mut builder).map_err(to_jinja_error)
    }

    /// Copy of the builder in its current state
    pub(crate) fn snapshot(&self) -> TemplateResult<ActionBuilder> {
        self.builder
            .lock()
            .map(|b| b.clone())
            .map_err(|e| TemplateError::Internal(format!("builder mutex poisoned: {e}")))
    }

    /// Finish the action
    pub(crate) fn finish(&self) -> TemplateResult<Registration> {
        let mut builder = self
            .builder
            .lock()
            .map_err(|e| TemplateError::Internal(format!("builder mutex poisoned: {e}")))?;
        Ok(builder.finish()?)
    }

    /// Call a bound name
    pub fn invoke(&self, binding: &str, args: &[Value]) -> Result<Value, Error> {
        if !is_supported(self.kind, binding) {
            return self.unsupported(binding);
        }
        match binding {
            "config" => {
                let config: ActionConfig = merged_map_arg(args, "config")?;
                self.with_builder(|b| b.apply_config(config))?;
                Ok(Value::from(""))
            }
            "type" => {
                let raw = string_arg(args, 0, "type()")?;
                let table_type = TableType::parse(&raw)
                    .ok_or_else(|| to_jinja_error(format!("unknown table type '{}'", raw)))?;
                self.with_builder(|b| b.set_type(table_type))?;
                Ok(Value::from(""))
            }
            "ref" => {
                let target = target_ref(args)?;
                self.with_builder(|b| b.add_dependency(target.clone()))?;
                Ok(Value::from(Deferred::Target { target }.encode()))
            }
            "resolve" => {
                let target = target_ref(args)?;
                Ok(Value::from(Deferred::Target { target }.encode()))
            }
            "self" | "this" => Ok(Value::from(Deferred::SelfTarget.encode())),
            "schema" => Ok(Value::from(Deferred::SelfSchema.encode())),
            "database" => Ok(Value::from(Deferred::SelfDatabase.encode())),
            "name" => self.with_builder(|b| Ok(Value::from(b.name()))),
            "dependencies" => {
                let mut deps = Vec::new();
                for arg in args {
                    deps.extend(string_list(arg)?);
                }
                self.with_builder(|b| {
                    deps.iter()
                        .try_for_each(|dep| b.add_dependency(TargetRef::parse(dep)))
                })?;
                Ok(Value::from(""))
            }
            "when" => {
                let chosen = if args.first().map(Value::is_true).unwrap_or(false) {
                    args.get(1)
                } else {
                    args.get(2)
                };
                Ok(chosen.cloned().unwrap_or_else(|| Value::from("")))
            }
            "incremental" => Ok(Value::from(self.incremental)),
            "where" => {
                let clause = string_arg(args, 0, "where()")?;
                self.with_builder(|b| b.set_where(clause))?;
                Ok(Value::from(""))
            }
            "preOps" | "postOps" => {
                let statements = match args.first() {
                    Some(arg) => string_list(arg)?,
                    None => Vec::new(),
                };
                let pre = binding == "preOps";
                self.with_builder(|b| {
                    statements.into_iter().try_for_each(|s| {
                        if pre {
                            b.add_pre_op(s)
                        } else {
                            b.add_post_op(s)
                        }
                    })
                })?;
                Ok(Value::from(""))
            }
            "describe" | "descriptor" => self.describe(args),
            "hasOutput" => {
                let has_output = flag_arg(args, 0);
                self.with_builder(|b| b.set_has_output(has_output))?;
                Ok(Value::from(""))
            }
            "tags" => {
                let mut tags = Vec::new();
                for arg in args {
                    tags.extend(string_list(arg)?);
                }
                self.with_builder(|b| b.add_tags(tags))?;
                Ok(Value::from(""))
            }
            "disabled" => {
                let disabled = flag_arg(args, 0);
                self.with_builder(|b| b.set_disabled(disabled))?;
                Ok(Value::from(""))
            }
            "bigquery" => {
                let options: BigQueryOptions = merged_map_arg(args, "bigquery")?;
                self.with_builder(|b| b.set_bigquery(options))?;
                Ok(Value::from(""))
            }
            other => self.unsupported(other),
        }
    }

    /// `describe("col", "text")` returns the column name so it can be used
    /// inline; `describe({...})` documents several columns at once.
    fn describe(&self, args: &[Value]) -> Result<Value, Error> {
        match args.first() {
            Some(first) if first.kind() == ValueKind::Map => {
                let columns: std::collections::BTreeMap<String, ColumnDoc> =
                    from_value(first, "describe")?;
                self.with_builder(|b| {
                    columns
                        .into_iter()
                        .try_for_each(|(column, doc)| b.set_column(column, doc))
                })?;
                Ok(Value::from(""))
            }
            Some(_) => {
                let column = string_arg(args, 0, "describe()")?;
                let doc = match args.get(1) {
                    Some(value) if value.kind() == ValueKind::Map => from_value(value, "describe")?,
                    Some(value) => ColumnDoc::Description(
                        value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                    ),
                    None => ColumnDoc::Description(String::new()),
                };
                let name = column.clone();
                self.with_builder(|b| b.set_column(name, doc))?;
                Ok(Value::from(column))
            }
            None => Err(to_jinja_error("describe() expects a column name or a map")),
        }
    }

    fn unsupported(&self, binding: &str) -> Result<Value, Error> {
        match self.policy {
            UnsupportedCapabilityPolicy::Silent => Ok(Value::from("")),
            UnsupportedCapabilityPolicy::Warn => {
                let message = format!(
                    "{}() is not available in {} actions and was ignored",
                    binding, self.kind
                );
                log::warn!("{}: {}", self.file_path, message);
                push_warning(&self.warnings, message)?;
                Ok(Value::from(""))
            }
            UnsupportedCapabilityPolicy::Error => Err(to_jinja_error(
                TemplateError::UnsupportedCapability {
                    name: binding.to_string(),
                    kind: self.kind.to_string(),
                },
            )),
        }
    }
}

/// Create a template function that forwards one bound name to a context
pub(crate) fn make_capability_fn(
    binding: &'static str,
    ctx: Arc<ActionContext>,
) -> impl Fn(Rest<Value>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |args: Rest<Value>| ctx.invoke(binding, &args)
}

/// The context as seen by a macro passed to a script handle:
/// `{% macro q(ctx) %}select * from {{ ctx.ref("a") }}{% endmacro %}`
#[derive(Debug)]
pub(crate) struct ContextObject {
    ctx: Arc<ActionContext>,
}

impl ContextObject {
    pub(crate) fn value(ctx: Arc<ActionContext>) -> Value {
        Value::from_object(ContextObject { ctx })
    }
}

impl Object for ContextObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        if !df_sqlx::LEGACY_BINDINGS.contains(&method) {
            return Err(Error::new(
                minijinja::ErrorKind::UnknownMethod,
                format!("context has no method named {}", method),
            ));
        }
        self.ctx.invoke(method, args)
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self: Sized + 'static,
    {
        write!(f, "<{} context>", self.ctx.kind())
    }
}

/// Parse a reference from `ref()` style arguments
pub(crate) fn target_ref(args: &[Value]) -> Result<TargetRef, Error> {
    match args {
        [single] if single.kind() == ValueKind::Map => from_value(single, "ref"),
        [single] => {
            let name = single
                .as_str()
                .ok_or_else(|| to_jinja_error("ref() expects a string or a target map"))?;
            if name.is_empty() {
                return Err(to_jinja_error("ref() requires a non-empty name"));
            }
            Ok(TargetRef::parse(name))
        }
        _ => {
            let parts = args
                .iter()
                .map(|a| {
                    a.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| to_jinja_error("ref() expects string arguments"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            TargetRef::from_parts(&parts).map_err(to_jinja_error)
        }
    }
}

/// Deserialize a Jinja value through JSON
pub(crate) fn from_value<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, Error> {
    serde_json::from_value(minijinja_value_to_json(value)).map_err(|e| {
        to_jinja_error(TemplateError::InvalidConfig {
            message: format!("{}: {}", what, e),
        })
    })
}

/// Merge every map argument, keyword arguments included, into one object
pub(crate) fn merged_map_arg<T: DeserializeOwned>(args: &[Value], what: &str) -> Result<T, Error> {
    let mut merged = serde_json::Map::new();
    for arg in args {
        match minijinja_value_to_json(arg) {
            serde_json::Value::Object(map) => merged.extend(map),
            _ => {
                return Err(to_jinja_error(TemplateError::InvalidConfig {
                    message: format!("{}() expects a mapping or keyword arguments", what),
                }))
            }
        }
    }
    serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| {
        to_jinja_error(TemplateError::InvalidConfig {
            message: format!("{}: {}", what, e),
        })
    })
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
