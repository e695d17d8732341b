//! Template loader scoped to the project root.
//!
//! Project code can only reach files below the project directory: absolute
//! paths and `..` components are rejected before touching the filesystem.

use crate::error::{TemplateError, TemplateResult};
use df_core::path::normalize_separators;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads project-relative files for `import`, `include` and `notebook()`
#[derive(Debug, Clone)]
pub struct ProjectLoader {
    root: Arc<PathBuf>,
}

impl ProjectLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a project-relative name to a filesystem path
    pub fn resolve(&self, name: &str) -> TemplateResult<PathBuf> {
        let normalized = normalize_separators(name);
        let escapes = normalized.starts_with('/')
            || Path::new(name).is_absolute()
            || normalized.split('/').any(|segment| segment == "..")
            || normalized.contains(':');
        if escapes || normalized.is_empty() {
            return Err(TemplateError::PathEscape {
                path: name.to_string(),
            });
        }
        Ok(self.root.join(normalized))
    }

    /// Read a file; `None` if it does not exist
    pub fn read(&self, name: &str) -> TemplateResult<Option<String>> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| TemplateError::Internal(format!("failed to read '{}': {}", name, e)))
    }

    /// Loader callback for a minijinja environment
    pub(crate) fn load(&self, name: &str) -> Result<Option<String>, minijinja::Error> {
        self.read(name).map_err(|e| {
            minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
        })
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
