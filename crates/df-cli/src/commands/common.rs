//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Intentionally empty: ExitCode is a control-flow mechanism, not a
        // user-facing error.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Exit status when the project itself has problems
pub(crate) const PROJECT_ERRORS: i32 = 1;

/// The file given on the command line, or `default` inside the project
pub(crate) fn project_file(global: &GlobalArgs, path: Option<&str>, default: &str) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => Path::new(&global.project_dir).join(default),
    }
}

/// Parse `--vars` JSON into string variables.
///
/// Non-string scalars are kept in their JSON spelling.
pub(crate) fn parse_vars(vars_json: Option<&str>) -> Result<BTreeMap<String, String>> {
    let Some(vars_json) = vars_json else {
        return Ok(BTreeMap::new());
    };
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(vars_json).context("Invalid --vars JSON")?;
    raw.into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(anyhow::anyhow!(
                "Invalid --vars JSON: value of '{}' must be a string, number or boolean",
                key
            )),
            other => Ok((key, other.to_string())),
        })
        .collect()
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
