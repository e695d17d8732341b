//! Compile command implementation

use anyhow::{Context, Result};
use df_core::CompiledGraph;
use df_sandbox::{CompileHost, CompileRequest, EntryPointMode, WorkerCommand};
use std::path::Path;
use std::time::Duration;

use crate::cli::{CompileArgs, GlobalArgs};
use crate::commands::common::{parse_vars, ExitCode, PROJECT_ERRORS};

/// Execute the compile command
pub(crate) async fn execute(args: &CompileArgs, global: &GlobalArgs) -> Result<()> {
    let project_dir = Path::new(&global.project_dir)
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", global.project_dir))?;

    let request = CompileRequest {
        project_dir: project_dir.to_string_lossy().into_owned(),
        schema_suffix_override: args.schema_suffix.clone(),
        use_legacy_entry_points: args.legacy_entry_points,
        vars: parse_vars(args.vars.as_deref())?,
        entry_point_mode: if args.strict_entry_points {
            EntryPointMode::Strict
        } else {
            EntryPointMode::FallbackToLegacy
        },
        unsupported_capabilities: args.unsupported_capabilities.into(),
        ..CompileRequest::default()
    };

    let mut worker =
        WorkerCommand::current_exe().context("Failed to locate the dataforge executable")?;
    if global.verbose {
        worker = worker.arg("--verbose");
        eprintln!(
            "[verbose] Compiling {} (timeout {}s)",
            project_dir.display(),
            args.timeout_secs
        );
    }
    let host = CompileHost::new(worker).with_timeout(Duration::from_secs(args.timeout_secs));
    let graph = host.compile(&request).await.context("Compilation failed")?;

    if args.json {
        println!("{}", graph.to_json_pretty()?);
    } else {
        print_summary(&graph)?;
    }

    if graph.graph_errors.is_fatal() {
        return Err(ExitCode(PROJECT_ERRORS).into());
    }
    Ok(())
}

fn print_summary(graph: &CompiledGraph) -> Result<()> {
    let counts = [
        ("tables", graph.tables.len()),
        ("operations", graph.operations.len()),
        ("assertions", graph.assertions.len()),
        ("declarations", graph.declarations.len()),
        ("notebooks", graph.notebooks.len()),
    ];
    println!("Compiled {} actions", graph.action_count());
    for (label, count) in counts.iter().filter(|(_, count)| *count > 0) {
        println!("  {}: {}", label, count);
    }
    println!("  fingerprint: {}", graph.fingerprint()?);

    let errors = &graph.graph_errors;
    for warning in &errors.warnings {
        eprintln!("Warning: {}: {}", warning.file_name, warning.message);
    }
    for error in &errors.compilation_errors {
        eprintln!("  ✗ {}: {}", error.file_name, error.message);
    }
    for error in &errors.validation_errors {
        eprintln!("  ✗ {}: {}", error.file_name, error.message);
    }
    if errors.is_fatal() {
        eprintln!(
            "\n{} compilation errors, {} validation errors",
            errors.compilation_errors.len(),
            errors.validation_errors.len()
        );
    }
    Ok(())
}
