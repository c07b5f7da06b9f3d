//! infratest CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Check failure
//! - 5: Terraform error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::run::RunFailure;
use commands::{Cli, Commands};
use infratest_suite::SuiteError;
use infratest_terraform::TerraformError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CHECK_FAILURE: u8 = 3;
    pub const TERRAFORM_ERROR: u8 = 5;
}

fn log_filter(cli: &Cli) -> EnvFilter {
    let level = if cli.verbose {
        "infratest=debug"
    } else if cli.quiet {
        "infratest=warn"
    } else {
        "infratest=info"
    };

    // RUST_LOG wins over the flags.
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", level)))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(log_filter(&cli))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::List(args) => commands::list::execute(args).await,
        Commands::UniqueId(args) => commands::unique_id::execute(args).await,
        Commands::Show(args) => commands::show::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error to its exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(failure) = e.downcast_ref::<RunFailure>() {
        return match failure {
            RunFailure::Checks { .. } => ExitCodes::CHECK_FAILURE,
            RunFailure::Terraform { .. } => ExitCodes::TERRAFORM_ERROR,
        };
    }

    if let Some(err) = e.downcast_ref::<SuiteError>() {
        return match err {
            SuiteError::UnknownBuiltin(_)
            | SuiteError::InvalidSuite(_)
            | SuiteError::InvalidPattern { .. }
            | SuiteError::Yaml(_) => ExitCodes::INVALID_ARGS,
            SuiteError::Terraform(_) => ExitCodes::TERRAFORM_ERROR,
            SuiteError::Io(_) => ExitCodes::GENERAL_ERROR,
        };
    }

    if e.downcast_ref::<TerraformError>().is_some() {
        return ExitCodes::TERRAFORM_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
