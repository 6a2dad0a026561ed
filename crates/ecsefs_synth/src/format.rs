//! Template output formats.

use serde::{Deserialize, Serialize};

use crate::error::{SynthError, SynthResult};

/// Supported template formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }

    pub fn from_str(s: &str) -> SynthResult<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TemplateFormat::Json),
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            other => Err(SynthError::UnsupportedFormat(other.to_string())),
        }
    }

    /// File name of the template for `stack_name`.
    pub fn file_name(&self, stack_name: &str) -> String {
        format!("{}.template.{}", stack_name, self.as_str())
    }
}

impl std::fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
