//! Synth command - Write the CloudFormation template and outputs report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ecsefs_core::{AssemblerOptions, StackAssembler};
use ecsefs_spec::StackLoader;
use ecsefs_synth::{TemplateFormat, TemplateSynthesizer};

use super::STACK_FILE;

#[derive(Args)]
pub struct SynthArgs {
    /// Stack configuration file (.yaml, .json or .toml)
    #[arg(short, long, default_value = STACK_FILE)]
    config: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "cdk.out")]
    out: PathBuf,

    /// Template format
    #[arg(short, long, default_value = "json", value_parser = ["json", "yaml", "yml"])]
    format: String,

    /// Treat validation warnings as errors
    #[arg(long)]
    deny_warnings: bool,

    /// Target account (overrides env.account)
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    account: Option<String>,

    /// Target region (overrides env.region)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
}

pub fn execute(args: SynthArgs) -> Result<()> {
    info!("Synthesizing stack from {:?}", args.config);

    let mut config = StackLoader::load(&args.config).context("Failed to load stack configuration")?;
    config.env = std::mem::take(&mut config.env).with_overrides(args.account, args.region);

    let format = TemplateFormat::from_str(&args.format)?;

    let assembler = StackAssembler::new(AssemblerOptions {
        deny_warnings: args.deny_warnings,
    });
    let stack = assembler.assemble(&config).context("Stack assembly failed")?;

    for warning in &stack.warnings {
        println!("⚠️  {}", warning);
    }

    let files = TemplateSynthesizer::new(format)
        .synthesize(&stack, &args.out)
        .context("Template synthesis failed")?;

    println!("✅ Synthesized {}", stack.stack_name);
    println!();
    println!("  📄 {}", files.template.display());
    println!("  📤 {}", files.outputs.display());
    println!();
    println!(
        "{} resources, {} services, {} load balancer(s)",
        stack.graph.len(),
        stack.services.len(),
        stack.load_balancers.len()
    );
    for service in &stack.services {
        let scaling = service.scaling.as_ref().map_or("none", |s| s.trigger);
        println!(
            "  📦 {:<8} → {} (volumes: {}, scaling: {})",
            service.name,
            service.load_balancer,
            service.volumes.len(),
            scaling
        );
    }

    Ok(())
}
