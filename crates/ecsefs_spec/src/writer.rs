//! Stack configuration writing utilities.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::loader::ConfigFormat;
use crate::models::StackConfig;

/// Writer for stack configuration files.
pub struct StackWriter;

impl StackWriter {
    /// Serialize a configuration in the given format.
    pub fn to_string(config: &StackConfig, format: ConfigFormat) -> SpecResult<String> {
        let content = match format {
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config)?,
        };
        Ok(content)
    }

    /// Write a configuration, choosing the format from the file extension.
    pub fn write(config: &StackConfig, path: impl AsRef<Path>) -> SpecResult<()> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| SpecError::UnsupportedFormat(path.to_path_buf()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Writing {} configuration to {:?}", format.as_str(), path);
        fs::write(path, Self::to_string(config, format)?)?;
        Ok(())
    }
}
