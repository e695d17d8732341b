//! Bundled core libraries and their entry points.
//!
//! A project pins the core it was written against with
//! `dataformCoreVersion`. Each bundled library may provide a compiler (file
//! source to template program) and an index generator (project directory to
//! file list). Libraries without them are served by the legacy
//! implementations, unless the request asks for strict entry points.

use crate::error::{SandboxError, SandboxResult};
use crate::index::{generate_index, legacy_generate_index, ProjectIndex};
use df_sqlx::{compile, compile_legacy, Program, SqlxResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Version of the core library built into this binary
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the bundled pre-SQLX core library
pub const LEGACY_CORE_VERSION: &str = "0.1.0";

/// Turns one definition file into a template program
pub type CompilerFn = fn(&str, &str) -> SqlxResult<Program>;

/// Lists the includes and definitions of a project
pub type IndexGeneratorFn = fn(&Path, Option<&[String]>) -> SandboxResult<ProjectIndex>;

#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub compiler: CompilerFn,
    pub index_generator: IndexGeneratorFn,
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints").finish_non_exhaustive()
    }
}

/// Implementations used for libraries without entry points
pub const LEGACY_ENTRY_POINTS: EntryPoints = EntryPoints {
    compiler: compile_legacy,
    index_generator: legacy_generate_index,
};

/// What to do when the selected library lacks entry points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryPointMode {
    /// Fail with the missing/outdated core package error
    Strict,
    /// Use the bundled legacy compiler and index generator
    #[default]
    FallbackToLegacy,
}

#[derive(Debug, Clone, Copy)]
pub struct CoreLibrary {
    pub version: &'static str,
    entry_points: Option<EntryPoints>,
}

/// Every core library shipped with this binary
pub const BUNDLED_LIBRARIES: &[CoreLibrary] = &[
    CoreLibrary {
        version: CORE_VERSION,
        entry_points: Some(EntryPoints {
            compiler: compile,
            index_generator: generate_index,
        }),
    },
    CoreLibrary {
        version: LEGACY_CORE_VERSION,
        entry_points: None,
    },
];

impl CoreLibrary {
    /// The library built into this binary
    pub fn current() -> &'static CoreLibrary {
        &BUNDLED_LIBRARIES[0]
    }

    /// Pick the library matching the declared version.
    ///
    /// Falls back to the current library, in which case a declared version
    /// is reported as a mismatch by the settings check.
    pub fn select(declared: Option<&str>) -> &'static CoreLibrary {
        declared
            .and_then(|version| BUNDLED_LIBRARIES.iter().find(|lib| lib.version == version))
            .unwrap_or_else(Self::current)
    }

    pub fn has_entry_points(&self) -> bool {
        self.entry_points.is_some()
    }

    /// Entry points to compile with
    pub fn entry_points(
        &self,
        mode: EntryPointMode,
        force_legacy: bool,
    ) -> SandboxResult<EntryPoints> {
        if force_legacy {
            log::debug!("legacy entry points requested");
            return Ok(LEGACY_ENTRY_POINTS);
        }
        match (self.entry_points, mode) {
            (Some(entry_points), _) => Ok(entry_points),
            (None, EntryPointMode::FallbackToLegacy) => {
                log::debug!(
                    "core library {} has no entry points; using legacy implementations",
                    self.version
                );
                Ok(LEGACY_ENTRY_POINTS)
            }
            (None, EntryPointMode::Strict) => Err(SandboxError::MissingEntryPoints {
                version: self.version.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "library_test.rs"]
mod tests;
