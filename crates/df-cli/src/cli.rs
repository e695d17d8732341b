//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use df_template::UnsupportedCapabilityPolicy;

/// Dataforge - compile SQLX projects into action graphs
#[derive(Parser, Debug)]
#[command(name = "dataforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(
        short = 'p',
        long,
        global = true,
        env = "DATAFORGE_PROJECT_DIR",
        default_value = "."
    )]
    pub project_dir: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the project into an action graph
    Compile(CompileArgs),

    /// Validate schedules or warehouse credentials
    Validate(ValidateArgs),

    /// Serve one compile request on stdin/stdout
    #[command(hide = true)]
    Worker,
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Print the compiled graph as JSON
    #[arg(long)]
    pub json: bool,

    /// Override the schema suffix from the project settings
    #[arg(long)]
    pub schema_suffix: Option<String>,

    /// Override/add variables as JSON
    #[arg(long)]
    pub vars: Option<String>,

    /// Kill the compile if it takes longer than this
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Use the bundled legacy compiler and index generator
    #[arg(long)]
    pub legacy_entry_points: bool,

    /// Fail instead of falling back when the core library lacks entry points
    #[arg(long)]
    pub strict_entry_points: bool,

    /// How to treat functions an action type does not support
    #[arg(long, value_enum, default_value = "warn")]
    pub unsupported_capabilities: CapabilityPolicy,
}

/// Unsupported capability handling
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityPolicy {
    /// Ignore the call
    Silent,
    /// Ignore the call and record a warning
    Warn,
    /// Fail the file
    Error,
}

impl From<CapabilityPolicy> for UnsupportedCapabilityPolicy {
    fn from(policy: CapabilityPolicy) -> Self {
        match policy {
            CapabilityPolicy::Silent => UnsupportedCapabilityPolicy::Silent,
            CapabilityPolicy::Warn => UnsupportedCapabilityPolicy::Warn,
            CapabilityPolicy::Error => UnsupportedCapabilityPolicy::Error,
        }
    }
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

#[derive(Subcommand, Debug)]
pub enum ValidateTarget {
    /// Check schedule names, cron expressions and notification emails
    Schedules(SchedulesArgs),

    /// Check a warehouse credentials file
    Credentials(CredentialsArgs),
}

/// Arguments for validate schedules
#[derive(Args, Debug)]
pub struct SchedulesArgs {
    /// Schedules file (default: schedules.json in the project directory)
    pub file: Option<String>,
}

/// Arguments for validate credentials
#[derive(Args, Debug)]
pub struct CredentialsArgs {
    /// Credentials file (default: .df-credentials.json in the project directory)
    pub file: Option<String>,

    /// Warehouse the credentials are for
    #[arg(short, long, default_value = "bigquery")]
    pub warehouse: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
