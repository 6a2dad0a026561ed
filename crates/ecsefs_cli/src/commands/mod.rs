//! CLI command definitions.
//!
//! Each subcommand maps to one step of working with a stack configuration.

use clap::{Parser, Subcommand};

pub mod graph;
pub mod init;
pub mod synth;
pub mod validate;

/// Default stack configuration file name.
pub const STACK_FILE: &str = "stack.yaml";

/// ecsefs - ECS on EC2 with EFS volumes behind shared load balancers
#[derive(Parser)]
#[command(name = "ecsefs")]
#[command(version, about = "ecsefs - compose ECS services, EFS volumes and shared ALBs into a CloudFormation template")]
#[command(long_about = r#"
ecsefs composes a list of ECS service definitions into a single CloudFormation
template: an ECS cluster on EC2 capacity, EFS-backed container volumes,
Application Load Balancers shared by name between services, and task
autoscaling.

WORKFLOWS:
  init      → Write a sample stack.yaml
  validate  → Check a stack configuration
  graph     → Print the resource graph and its dependency edges
  synth     → Write the template and outputs.json

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  5 - Synthesis error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sample stack configuration
    Init(init::InitArgs),

    /// Validate a stack configuration
    Validate(validate::ValidateArgs),

    /// Print the assembled resource graph
    Graph(graph::GraphArgs),

    /// Synthesize the CloudFormation template
    Synth(synth::SynthArgs),
}
