//! Writing templates and output reports to disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use ecsefs_core::AssembledStack;

use crate::error::{SynthError, SynthResult};
use crate::format::TemplateFormat;
use crate::template::Template;

pub const OUTPUTS_FILE: &str = "outputs.json";

/// One emitted value in the output report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputEntry {
    pub key: String,
    pub description: String,
    /// Intrinsic expression resolved by the provisioning engine.
    pub value: Value,
}

/// Contents of `outputs.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputReport {
    pub stack_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub load_balancers: Vec<String>,
    pub outputs: Vec<OutputEntry>,
}

impl OutputReport {
    pub fn from_stack(stack: &AssembledStack) -> Self {
        Self {
            stack_name: stack.stack_name.clone(),
            account: stack.environment.account.clone(),
            region: stack.environment.region.clone(),
            load_balancers: stack.load_balancers.clone(),
            outputs: stack
                .graph
                .outputs()
                .iter()
                .map(|o| OutputEntry {
                    key: o.key.clone(),
                    description: o.description.clone(),
                    value: o.value.clone(),
                })
                .collect(),
        }
    }
}

/// Paths written by a synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesizedFiles {
    pub template: PathBuf,
    pub outputs: PathBuf,
}

/// Template synthesizer.
pub struct TemplateSynthesizer {
    format: TemplateFormat,
}

impl TemplateSynthesizer {
    /// Create a new synthesizer.
    pub fn new(format: TemplateFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    /// Render the stack's template as text.
    pub fn render(&self, stack: &AssembledStack) -> SynthResult<String> {
        let template = Template::from_graph(&stack.graph);
        let mut text = match self.format {
            TemplateFormat::Json => serde_json::to_string_pretty(&template)?,
            TemplateFormat::Yaml => serde_yaml::to_string(&template)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    /// Write the template and `outputs.json` into `out_dir`.
    pub fn synthesize(&self, stack: &AssembledStack, out_dir: &Path) -> SynthResult<SynthesizedFiles> {
        info!("Synthesizing {} into {:?}", stack.stack_name, out_dir);

        if out_dir.exists() && !out_dir.is_dir() {
            return Err(SynthError::NotADirectory(out_dir.to_path_buf()));
        }
        fs::create_dir_all(out_dir)?;

        let template_path = out_dir.join(self.format.file_name(&stack.stack_name));
        fs::write(&template_path, self.render(stack)?)?;
        debug!("Wrote {:?}", template_path);

        let outputs_path = out_dir.join(OUTPUTS_FILE);
        let report = OutputReport::from_stack(stack);
        let mut json = serde_json::to_string_pretty(&report)?;
        json.push('\n');
        fs::write(&outputs_path, json)?;
        debug!("Wrote {:?}", outputs_path);

        info!(
            "Synthesized {} resources and {} outputs",
            stack.graph.len(),
            report.outputs.len()
        );

        Ok(SynthesizedFiles {
            template: template_path,
            outputs: outputs_path,
        })
    }
}

impl Default for TemplateSynthesizer {
    fn default() -> Self {
        Self::new(TemplateFormat::default())
    }
}
