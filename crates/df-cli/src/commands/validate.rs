//! Validate command implementation

use anyhow::{Context, Result};
use df_core::credentials::{self, CREDENTIALS_FILENAME};
use df_core::schedules::{validate_schedules, SchedulesJson, SCHEDULES_FILE};

use crate::cli::{CredentialsArgs, GlobalArgs, SchedulesArgs, ValidateArgs, ValidateTarget};
use crate::commands::common::{project_file, ExitCode, PROJECT_ERRORS};

/// Execute the validate command
pub(crate) async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    match &args.target {
        ValidateTarget::Schedules(args) => schedules(args, global),
        ValidateTarget::Credentials(args) => credentials(args, global),
    }
}

fn schedules(args: &SchedulesArgs, global: &GlobalArgs) -> Result<()> {
    let path = project_file(global, args.file.as_deref(), SCHEDULES_FILE);
    if global.verbose {
        eprintln!("[verbose] Validating {}", path.display());
    }
    let schedules = SchedulesJson::load(&path).context("Failed to load schedules")?;

    let errors = validate_schedules(&schedules);
    if errors.is_empty() {
        println!("✓ {} schedules are valid", schedules.schedules.len());
        return Ok(());
    }
    for error in &errors {
        eprintln!("  ✗ {}", error);
    }
    eprintln!("\n{} problems found in {}", errors.len(), path.display());
    Err(ExitCode(PROJECT_ERRORS).into())
}

fn credentials(args: &CredentialsArgs, global: &GlobalArgs) -> Result<()> {
    let path = project_file(global, args.file.as_deref(), CREDENTIALS_FILENAME);
    if global.verbose {
        eprintln!(
            "[verbose] Validating {} credentials in {}",
            args.warehouse,
            path.display()
        );
    }
    match credentials::read(&args.warehouse, &path) {
        Ok(_) => {
            println!("✓ {} credentials are valid", args.warehouse);
            Ok(())
        }
        Err(e) => {
            eprintln!("  ✗ {}", e);
            Err(ExitCode(PROJECT_ERRORS).into())
        }
    }
}
