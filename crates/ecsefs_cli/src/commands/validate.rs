//! Validate command - Validate a stack configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ecsefs_spec::{StackLoader, StackValidator};

use super::STACK_FILE;

#[derive(Args)]
pub struct ValidateArgs {
    /// Stack configuration file (.yaml, .json or .toml)
    #[arg(short, long, default_value = STACK_FILE)]
    config: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    deny_warnings: bool,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating stack configuration: {:?}", args.config);

    let config = StackLoader::load(&args.config).context("Failed to load stack configuration")?;
    let result = StackValidator::validate(&config);

    println!("📋 Validating {} ({} services)...", config.stack_name, config.services.len());

    if result.valid {
        println!("   ✅ Configuration is valid");
    } else {
        println!("   ❌ Validation failed:");
        for error in &result.errors {
            println!("      - {}", error);
        }
    }
    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    let (errors, warnings) = (result.errors.len(), result.warnings.len());
    result.into_result(args.deny_warnings).with_context(|| {
        format!(
            "Stack validation failed with {} error(s) and {} warning(s)",
            errors, warnings
        )
    })?;

    println!();
    println!("Load balancers:");
    for name in config.load_balancer_names() {
        println!("  ⚖️  {}", name);
    }

    Ok(())
}
