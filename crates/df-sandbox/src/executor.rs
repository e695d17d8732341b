//! In-process compile of one project.
//!
//! Settings problems, a missing core library and an unreadable project
//! directory abort the whole compile. Everything that goes wrong inside a
//! single include or definition, panics included, is recorded as a
//! compilation error against that file and the remaining files still run.

use crate::error::{SandboxError, SandboxResult};
use crate::index::ProjectIndex;
use crate::library::{CoreLibrary, EntryPoints};
use crate::protocol::CompileRequest;
use df_core::{CompiledGraph, ProjectConfig, Session, SettingsOverrides};
use df_sqlx::Program;
use df_template::{FileOutput, SandboxEnvironment, TemplateOptions, DEFAULT_FUEL};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Compile the project named by `request` into a graph
pub fn compile_project(request: &CompileRequest) -> SandboxResult<CompiledGraph> {
    let project_dir = project_root(&request.project_dir)?;

    let (mut config, source) = ProjectConfig::load_from_dir(&project_dir)?;
    log::debug!("loaded settings from {:?}", source);
    config.apply_overrides(&SettingsOverrides {
        schema_suffix: request.schema_suffix_override.clone(),
        vars: request.vars.clone(),
    })?;

    let library = CoreLibrary::select(config.dataform_core_version.as_deref());
    config.check_core_version(library.version)?;
    let entry_points =
        library.entry_points(request.entry_point_mode, request.use_legacy_entry_points)?;

    let index = (entry_points.index_generator)(&project_dir, request.file_paths.as_deref())?;
    log::debug!(
        "compiling {} files with core library {}",
        index.file_count(),
        library.version
    );

    let options = TemplateOptions {
        vars: config.vars.clone(),
        policy: request.unsupported_capabilities,
        fuel: fuel_limit(request.fuel),
    };
    let mut env = SandboxEnvironment::new(project_dir.clone(), options);
    let mut session = Session::new(config, library.version);

    evaluate_index(&mut session, &mut env, &entry_points, &index);
    Ok(session.compile())
}

/// Evaluate includes, then definitions, reporting into `session`
pub fn evaluate_index(
    session: &mut Session,
    env: &mut SandboxEnvironment,
    entry_points: &EntryPoints,
    index: &ProjectIndex,
) {
    for path in &index.include_paths {
        let probed = isolate(|| {
            let source = read_file(env, path)?;
            Ok(env.probe_include(path, &source)?)
        });
        match probed {
            Ok(warnings) => {
                let alias = env.add_import(path);
                log::debug!("imported {} as {}", path, alias);
                for warning in warnings {
                    session.warn(path, warning);
                }
            }
            Err(e) => session.compile_error(path, e.to_string()),
        }
    }

    for path in &index.definition_paths {
        let evaluated = isolate(|| {
            let source = read_file(env, path)?;
            let program = (entry_points.compiler)(path, &source)?;
            if let Program::Sql(sql) = &program {
                log::debug!("{}:\n{}", path, sql.listing());
            }
            Ok(env.run(&program)?)
        });
        match evaluated {
            Ok(FileOutput {
                registrations,
                tests,
                warnings,
            }) => {
                for registration in registrations {
                    session.register(registration);
                }
                for test in tests {
                    session.register_test(test);
                }
                for warning in warnings {
                    session.warn(path, warning);
                }
            }
            Err(e) => {
                log::debug!("{} failed: {}", path, e);
                session.compile_error(path, e.to_string());
            }
        }
    }
}

fn project_root(project_dir: &str) -> SandboxResult<PathBuf> {
    let path = Path::new(project_dir);
    let root = path.canonicalize().map_err(|e| SandboxError::ProjectDir {
        path: project_dir.to_string(),
        message: e.to_string(),
    })?;
    if !root.is_dir() {
        return Err(SandboxError::ProjectDir {
            path: project_dir.to_string(),
            message: "not a directory".to_string(),
        });
    }
    Ok(root)
}

fn read_file(env: &SandboxEnvironment, path: &str) -> SandboxResult<String> {
    env.loader()
        .read(path)?
        .ok_or_else(|| SandboxError::FileNotFound {
            path: path.to_string(),
        })
}

fn fuel_limit(requested: Option<u64>) -> Option<u64> {
    match requested {
        None => Some(DEFAULT_FUEL),
        Some(0) => None,
        Some(fuel) => Some(fuel),
    }
}

/// Run one file's evaluation, turning a panic into an error
fn isolate<T>(f: impl FnOnce() -> SandboxResult<T>) -> SandboxResult<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(SandboxError::Panic(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
