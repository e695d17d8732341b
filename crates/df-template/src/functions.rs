//! Helper functions available to every project file: var(), log(), error(),
//! warn(), from_json(), and to_json(). Plus value conversion between Jinja
//! and JSON.

use crate::error::{to_jinja_error, TemplateError};
use minijinja::value::{Value, ValueKind};
use minijinja::Error;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Captured warnings from warn() calls and ignored capabilities
pub(crate) type WarningCapture = Arc<Mutex<Vec<String>>>;

/// Create the var() function that retrieves project variables
///
/// Usage in templates:
/// ```jinja
/// {{ var('start_date') }}
/// {{ var('missing', 'default_value') }}
/// ```
pub(crate) fn make_var_fn(
    vars: BTreeMap<String, String>,
) -> impl Fn(&str, Option<Value>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |name: &str, default: Option<Value>| {
        if let Some(value) = vars.get(name) {
            Ok(Value::from(value.as_str()))
        } else if let Some(default_val) = default {
            Ok(default_val)
        } else {
            Err(Error::new(
                minijinja::ErrorKind::UndefinedError,
                TemplateError::UnknownVariable {
                    name: name.to_string(),
                }
                .to_string(),
            ))
        }
    }
}

/// Create the `log(msg)` function for template debugging.
///
/// Logs the message and returns an empty string so it does not affect the
/// rendered SQL output.
pub(crate) fn make_log_fn(
    file_path: String,
) -> impl Fn(&str) -> String + Send + Sync + Clone + 'static {
    move |msg: &str| {
        log::info!("[jinja:log] {}: {}", file_path, msg);
        String::new()
    }
}

/// Create the `error(msg)` function that fails the current file.
///
/// Usage in templates:
/// ```jinja
/// {% if var("env") == "prod" %}{{ error("Cannot run in prod!") }}{% endif %}
/// ```
pub(crate) fn make_error_fn(
) -> impl Fn(&str) -> Result<String, Error> + Send + Sync + Clone + 'static {
    |msg: &str| {
        Err(Error::new(
            minijinja::ErrorKind::InvalidOperation,
            msg.to_string(),
        ))
    }
}

/// Create the `warn(msg)` function that records a warning on the graph.
///
/// Returns an empty string.
pub(crate) fn make_warn_fn(
    capture: WarningCapture,
) -> impl Fn(&str) -> Result<String, Error> + Send + Sync + Clone + 'static {
    move |msg: &str| {
        log::warn!("[jinja:warn] {}", msg);
        push_warning(&capture, msg.to_string())?;
        Ok(String::new())
    }
}

/// Append a warning unless the same text was already recorded
pub(crate) fn push_warning(capture: &WarningCapture, message: String) -> Result<(), Error> {
    let mut warnings = capture
        .lock()
        .map_err(|e| to_jinja_error(format!("warning mutex poisoned: {e}")))?;
    if !warnings.contains(&message) {
        warnings.push(message);
    }
    Ok(())
}

/// Create the `from_json(str)` function to parse a JSON string.
///
/// Usage in templates:
/// ```jinja
/// {% set data = from_json('{"key": "value"}') %}
/// {{ data.key }}
/// ```
pub(crate) fn make_from_json_fn(
) -> impl Fn(&str) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    |s: &str| {
        let parsed: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| to_jinja_error(format!("from_json parse error: {}", e)))?;
        Ok(json_to_minijinja_value(&parsed))
    }
}

/// Create the `to_json(value)` function to serialize a value to JSON.
///
/// Also registered as a filter so `{{ value | to_json }}` works.
pub(crate) fn make_to_json_fn(
) -> impl Fn(Value) -> Result<String, Error> + Send + Sync + Clone + 'static {
    |val: Value| {
        let json_val = minijinja_value_to_json(&val);
        serde_json::to_string(&json_val)
            .map_err(|e| to_jinja_error(format!("to_json serialization error: {}", e)))
    }
}

/// Convert serde_json::Value to minijinja::Value
pub(crate) fn json_to_minijinja_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::from(()),
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f)
            } else {
                Value::from(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(arr) => {
            let values: Vec<Value> = arr.iter().map(json_to_minijinja_value).collect();
            Value::from(values)
        }
        serde_json::Value::Object(obj) => {
            let map: HashMap<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), json_to_minijinja_value(v)))
                .collect();
            Value::from_iter(map)
        }
    }
}

/// Convert a minijinja Value to a serde_json::Value.
///
/// Keyword arguments arrive as a map value and convert like any other map.
pub(crate) fn minijinja_value_to_json(val: &Value) -> serde_json::Value {
    match val.kind() {
        ValueKind::Undefined | ValueKind::None => serde_json::Value::Null,
        ValueKind::Bool => serde_json::Value::Bool(val.is_true()),
        ValueKind::Number => {
            let owned = val.clone();
            if let Ok(i) = i64::try_from(owned.clone()) {
                serde_json::Value::Number(i.into())
            } else if let Ok(f) = f64::try_from(owned) {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        ValueKind::String => {
            serde_json::Value::String(val.as_str().unwrap_or_default().to_string())
        }
        ValueKind::Seq => {
            let items: Vec<serde_json::Value> = val
                .try_iter()
                .map(|iter| iter.map(|v| minijinja_value_to_json(&v)).collect())
                .unwrap_or_default();
            serde_json::Value::Array(items)
        }
        ValueKind::Map => build_json_map(val),
        _ => serde_json::Value::String(val.to_string()),
    }
}

/// Convert a minijinja map value to a JSON object.
fn build_json_map(val: &Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Ok(keys) = val.try_iter() {
        for key in keys {
            let key_str = key.as_str().unwrap_or_default().to_string();
            if let Ok(v) = val.get_item(&key) {
                map.insert(key_str, minijinja_value_to_json(&v));
            }
        }
    }
    serde_json::Value::Object(map)
}

/// Read a string or a list of strings
pub(crate) fn string_list(val: &Value) -> Result<Vec<String>, Error> {
    match val.kind() {
        ValueKind::String => Ok(vec![val.as_str().unwrap_or_default().to_string()]),
        ValueKind::Seq => val
            .try_iter()?
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    to_jinja_error(format!("expected a string, got {}", item.kind()))
                })
            })
            .collect(),
        ValueKind::Undefined | ValueKind::None => Ok(Vec::new()),
        other => Err(to_jinja_error(format!(
            "expected a string or a list of strings, got {}",
            other
        ))),
    }
}

/// Read a required string argument
pub(crate) fn string_arg(args: &[Value], index: usize, what: &str) -> Result<String, Error> {
    args.get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| to_jinja_error(format!("{} expects a string argument", what)))
}

/// Read an optional boolean argument, treating absence as `true`
pub(crate) fn flag_arg(args: &[Value], index: usize) -> bool {
    args.get(index).map(Value::is_true).unwrap_or(true)
}

#[cfg(test)]
#[path = "functions_test.rs"]
mod tests;
