//! Graph command - Print the assembled resource graph.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use ecsefs_core::{AssembledStack, Concern, StackAssembler};
use ecsefs_spec::StackLoader;

use super::STACK_FILE;

#[derive(Args)]
pub struct GraphArgs {
    /// Stack configuration file (.yaml, .json or .toml)
    #[arg(short, long, default_value = STACK_FILE)]
    config: PathBuf,

    /// Print the graph as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct GraphNode<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    cfn_type: &'static str,
    concern: Concern,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<&'a str>,
    depends_on: Vec<String>,
}

#[derive(Serialize)]
struct GraphOutput<'a> {
    key: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct GraphReport<'a> {
    stack_name: &'a str,
    load_balancers: &'a [String],
    resources: Vec<GraphNode<'a>>,
    outputs: Vec<GraphOutput<'a>>,
}

pub fn execute(args: GraphArgs) -> Result<()> {
    info!("Assembling resource graph for {:?}", args.config);

    let config = StackLoader::load(&args.config).context("Failed to load stack configuration")?;
    let stack = StackAssembler::default()
        .assemble(&config)
        .context("Stack assembly failed")?;

    let edges = dependency_map(&stack);
    let report = GraphReport {
        stack_name: &stack.stack_name,
        load_balancers: &stack.load_balancers,
        resources: stack
            .graph
            .resources()
            .iter()
            .map(|r| GraphNode {
                id: r.id.as_str(),
                cfn_type: r.kind.cfn_type(),
                concern: r.concern,
                owner: r.owner.as_deref(),
                depends_on: edges.get(r.id.as_str()).cloned().unwrap_or_default(),
            })
            .collect(),
        outputs: stack
            .graph
            .outputs()
            .iter()
            .map(|o| GraphOutput {
                key: &o.key,
                description: &o.description,
            })
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📦 {} ({} resources)", report.stack_name, report.resources.len());
    println!();
    for node in &report.resources {
        let owner = node.owner.map(|o| format!(" [{}]", o)).unwrap_or_default();
        println!("  {} ({}){}", node.id, node.cfn_type, owner);
        for dep in &node.depends_on {
            println!("    → {}", dep);
        }
    }

    println!();
    println!("Outputs:");
    for output in &report.outputs {
        println!("  📤 {} - {}", output.key, output.description);
    }

    Ok(())
}

/// Dependency targets per resource, explicit and implicit.
fn dependency_map(stack: &AssembledStack) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (from, to) in stack.graph.edges() {
        map.entry(from.to_string()).or_default().push(to.to_string());
    }
    map
}
