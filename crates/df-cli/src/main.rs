//! Dataforge CLI - compile SQLX projects into action graphs

use clap::Parser;

mod cli;
mod commands;
mod logger;

use cli::Cli;
use commands::common::ExitCode;
use commands::{compile, validate, worker};

/// Exit status for failures of Dataforge itself
const INTERNAL_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logger::init(cli.global.verbose);

    let result = match &cli.command {
        cli::Commands::Compile(args) => compile::execute(args, &cli.global).await,
        cli::Commands::Validate(args) => validate::execute(args, &cli.global).await,
        cli::Commands::Worker => worker::execute().await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ExitCode>() {
            Some(ExitCode(code)) => {
                std::process::ExitCode::from(u8::try_from(*code).unwrap_or(INTERNAL_FAILURE))
            }
            None => {
                eprintln!("Error: {:#}", err);
                std::process::ExitCode::from(INTERNAL_FAILURE)
            }
        },
    }
}
