//! Init command - Write a sample stack configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ecsefs_spec::{sample_stack, StackWriter};

use super::STACK_FILE;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to write stack.yaml into (defaults to current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Overwrite an existing stack.yaml
    #[arg(short, long)]
    force: bool,
}

pub fn execute(args: InitArgs) -> Result<()> {
    let dir = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let file = dir.join(STACK_FILE);

    info!("Writing sample stack to {:?}", file);

    if file.exists() && !args.force {
        anyhow::bail!(
            "Stack configuration already exists at {:?}. Use --force to overwrite.",
            file
        );
    }

    let config = sample_stack();
    StackWriter::write(&config, &file).context("Failed to write sample stack")?;

    println!("✅ Sample stack written to {}", file.display());
    println!();
    println!("Services:");
    for service in &config.services {
        println!(
            "  📦 {:<8} → {} ({} task(s))",
            service.name, service.load_balancer.name, service.desired_count
        );
    }
    println!();
    println!("Next steps:");
    println!("  ecsefs validate -c {}", file.display());
    println!("  ecsefs synth -c {} -o cdk.out", file.display());

    Ok(())
}
