//! ecsefs CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 5: Synthesis error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ecsefs_core::CoreError;
use ecsefs_spec::SpecError;
use ecsefs_synth::SynthError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const SYNTH_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Graph(args) => commands::graph::execute(args),
        Commands::Synth(args) => commands::synth::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "ecsefs=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "ecsefs=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let log_result = if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
///
/// The first typed error found in the chain decides. A `CoreError` that only
/// wraps a `SpecError` defers to the wrapped error.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<SpecError>() {
            return match err {
                SpecError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                SpecError::NotFound(_) | SpecError::UnsupportedFormat(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<CoreError>() {
            if !matches!(err, CoreError::Spec(_)) {
                return ExitCodes::GENERAL_ERROR;
            }
        }
        if cause.downcast_ref::<SynthError>().is_some() {
            return ExitCodes::SYNTH_ERROR;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_categorize_validation_failure() {
        let err: anyhow::Result<()> =
            Err(CoreError::Spec(SpecError::ValidationFailed(vec!["vpc_name cannot be empty".into()])))
                .context("Stack assembly failed");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::VALIDATION_FAILURE);
    }

    #[test]
    fn test_categorize_synthesis_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let err: anyhow::Result<()> = Err(SynthError::Io(io)).context("Template synthesis failed");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::SYNTH_ERROR);
    }

    #[test]
    fn test_categorize_missing_config() {
        let err: anyhow::Result<()> = Err(SpecError::NotFound("stack.yaml".into()))
            .context("Failed to load stack configuration");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_categorize_ignores_words_in_paths() {
        let err: anyhow::Result<()> = Err(SpecError::NotFound("configs/stack.template.yaml".into()))
            .context("Failed to load stack configuration");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::INVALID_ARGS);

        let err = anyhow!("Stack validation failed at template.yaml");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_categorize_assembly_error() {
        let err: anyhow::Result<()> =
            Err(CoreError::DuplicateResource("TaskDefApp1".into())).context("Stack assembly failed");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_categorize_general() {
        assert_eq!(categorize_error(&anyhow!("boom")), ExitCodes::GENERAL_ERROR);
    }
}
