//! Project index: which includes and definitions a compile evaluates.
//!
//! Discovery is glob-based and rooted at the project directory. Paths in
//! the index are project-relative with forward slashes, sorted and free of
//! duplicates, so that the evaluation order never depends on the filesystem.

use crate::error::{SandboxError, SandboxResult};
use df_core::path::{file_extension, normalize_separators};
use std::collections::BTreeSet;
use std::path::Path;

/// Directory holding shared Jinja macros
pub const INCLUDES_DIR: &str = "includes";

/// Include files imported into every definition
pub const INCLUDE_PATTERNS: &[&str] = &["includes/*.jinja"];

/// Definition files, with `models/` as the legacy location
pub const DEFINITION_PATTERNS: &[&str] = &[
    "definitions/**/*.jinja",
    "definitions/**/*.sql",
    "definitions/**/*.sqlx",
    "models/**/*.jinja",
    "models/**/*.sql",
    "models/**/*.sqlx",
];

/// Definition files understood by the legacy compiler, which predates SQLX
pub const LEGACY_DEFINITION_PATTERNS: &[&str] = &[
    "definitions/**/*.jinja",
    "definitions/**/*.sql",
    "models/**/*.jinja",
    "models/**/*.sql",
];

/// Files evaluated by one compile, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectIndex {
    pub include_paths: Vec<String>,
    pub definition_paths: Vec<String>,
}

impl ProjectIndex {
    pub fn file_count(&self) -> usize {
        self.include_paths.len() + self.definition_paths.len()
    }
}

/// Index generator entry point of the current core library
pub fn generate_index(
    project_dir: &Path,
    file_paths: Option<&[String]>,
) -> SandboxResult<ProjectIndex> {
    build_index(project_dir, file_paths, DEFINITION_PATTERNS)
}

/// Index generator used when a core library has no entry points
pub fn legacy_generate_index(
    project_dir: &Path,
    file_paths: Option<&[String]>,
) -> SandboxResult<ProjectIndex> {
    build_index(project_dir, file_paths, LEGACY_DEFINITION_PATTERNS)
}

fn build_index(
    project_dir: &Path,
    file_paths: Option<&[String]>,
    definition_patterns: &[&str],
) -> SandboxResult<ProjectIndex> {
    let index = match file_paths {
        Some(paths) => index_from_paths(paths, definition_patterns),
        None => ProjectIndex {
            include_paths: discover(project_dir, INCLUDE_PATTERNS)?,
            definition_paths: discover(project_dir, definition_patterns)?,
        },
    };
    log::debug!(
        "indexed {} includes and {} definitions in {}",
        index.include_paths.len(),
        index.definition_paths.len(),
        project_dir.display()
    );
    Ok(index)
}

/// Expand patterns relative to `project_dir`
pub fn discover(project_dir: &Path, patterns: &[&str]) -> SandboxResult<Vec<String>> {
    let root = glob::Pattern::escape(&normalize_separators(&project_dir.to_string_lossy()));
    let mut found = BTreeSet::new();

    for pattern in patterns {
        let full = format!("{}/{}", root.trim_end_matches('/'), pattern);
        let entries = glob::glob(&full).map_err(|e| SandboxError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        for entry in entries {
            let path = entry.map_err(|e| SandboxError::ProjectDir {
                path: project_dir.display().to_string(),
                message: e.to_string(),
            })?;
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(project_dir).unwrap_or(&path);
            let relative = normalize_separators(&relative.to_string_lossy());
            found.insert(relative.trim_start_matches("./").to_string());
        }
    }

    Ok(found.into_iter().collect())
}

/// Split an explicit file list into includes and definitions.
///
/// Files whose extension the index would never discover are skipped.
fn index_from_paths(paths: &[String], definition_patterns: &[&str]) -> ProjectIndex {
    let definition_extensions: BTreeSet<&str> = definition_patterns
        .iter()
        .map(|pattern| file_extension(pattern))
        .collect();

    let mut includes = BTreeSet::new();
    let mut definitions = BTreeSet::new();
    for path in paths {
        let path = normalize_separators(path.trim_start_matches("./"));
        let extension = file_extension(&path);
        if path.starts_with(&format!("{}/", INCLUDES_DIR)) && extension == "jinja" {
            includes.insert(path);
        } else if definition_extensions.contains(extension) {
            definitions.insert(path);
        } else {
            log::debug!("skipping {}: not a definition file", path);
        }
    }

    ProjectIndex {
        include_paths: includes.into_iter().collect(),
        definition_paths: definitions.into_iter().collect(),
    }
}

#[cfg(test)]
#[path = "index_test.rs"]
mod tests;
