//! forge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: IaC error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const IAC_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("forge=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(args).await,
        Commands::Deploy(args) => commands::deploy::execute(args).await,
        Commands::Connect(args) => commands::connect::execute(args).await,
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

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("validation failed") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("template") {
        ExitCodes::TEMPLATE_ERROR
    } else if msg.contains("terraform") || msg.contains("infrastructure") {
        ExitCodes::IAC_ERROR
    } else if msg.contains("missing required environment variable") || msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failure_maps_to_its_own_exit_code() {
        let err = anyhow::anyhow!("validation failed: dockerfile errors [\"missing FROM\"]");
        assert_eq!(categorize_error(&err), ExitCodes::VALIDATION_FAILURE);
    }

    #[test]
    fn terraform_failure_maps_to_iac_error() {
        let err = anyhow::anyhow!("terraform apply failed: exit status 1");
        assert_eq!(categorize_error(&err), ExitCodes::IAC_ERROR);
    }

    #[test]
    fn missing_env_var_maps_to_invalid_args() {
        let err = anyhow::anyhow!("missing required environment variable FORGE_AWS_ACCOUNT_ID");
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn unrecognized_error_falls_back_to_general() {
        let err = anyhow::anyhow!("the docker daemon is unreachable");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
