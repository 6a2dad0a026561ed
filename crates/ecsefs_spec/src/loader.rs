//! Stack configuration loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{SpecError, SpecResult};
use crate::models::{ServiceSpec, StackConfig};

/// On-disk configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
        }
    }

    /// Deserialize `content` in this format.
    pub fn parse<T: DeserializeOwned>(&self, content: &str) -> SpecResult<T> {
        let value = match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(value)
    }
}

/// Loader for stack configuration files.
pub struct StackLoader;

impl StackLoader {
    /// Load a stack configuration, including any `services_dir` entries.
    pub fn load(path: impl AsRef<Path>) -> SpecResult<StackConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }

        let mut config: StackConfig = Self::read_file(path)?;

        if let Some(dir) = config.services_dir.clone() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let extra = Self::read_services_dir(&base.join(dir))?;
            config.services.extend(extra);
        }

        info!(
            "Loaded stack '{}' with {} services from {:?}",
            config.stack_name,
            config.services.len(),
            path
        );
        Ok(config)
    }

    /// Parse a stack configuration from a string.
    pub fn parse_str(content: &str, format: ConfigFormat) -> SpecResult<StackConfig> {
        format.parse(content)
    }

    /// Read every service file directly under `dir`, ordered by file name.
    pub fn read_services_dir(dir: &Path) -> SpecResult<Vec<ServiceSpec>> {
        if !dir.is_dir() {
            return Err(SpecError::NotFound(dir.to_path_buf()));
        }

        let mut services = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || ConfigFormat::from_path(path).is_none() {
                debug!("Skipping non-config entry {:?}", path);
                continue;
            }
            let service: ServiceSpec = Self::read_file(path)?;
            debug!("Read service '{}' from {:?}", service.name, path);
            services.push(service);
        }

        Ok(services)
    }

    fn read_file<T: DeserializeOwned>(path: &Path) -> SpecResult<T> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| SpecError::UnsupportedFormat(path.to_path_buf()))?;
        debug!("Reading {} configuration from {:?}", format.as_str(), path);

        let content = fs::read_to_string(path)?;
        format.parse(&content).map_err(|e| SpecError::InvalidFormat {
            path: PathBuf::from(path),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
vpc_name: dev-vpc
capacity:
  instance_type: m6a.xlarge
  desired_capacity: 2
services:
  - name: app1
    desired_count: 1
    container:
      image: amazon/amazon-ecs-sample
    load_balancer:
      name: shared-alb
"#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.JSON")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.txt")), None);
    }

    #[test]
    fn test_parse_minimal_applies_defaults() {
        let config = StackLoader::parse_str(MINIMAL, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.stack_name, "EcsEfsStack");
        assert!(config.container_insights);

        let service = &config.services[0];
        assert!(service.placement_strategies.is_empty());
        assert!(service.container.essential);
        assert_eq!(service.load_balancer.listener.port, 80);
        assert_eq!(service.max_healthy_percent(), 200);
        assert_eq!(service.min_healthy_percent(), 50);
    }

    #[test]
    fn test_missing_mandatory_field_is_rejected() {
        let yaml = "capacity:\n  instance_type: t3.micro\n  desired_capacity: 1\n";
        let err = StackLoader::parse_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("vpc_name"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = StackLoader::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, SpecError::NotFound(_)));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.ini");
        fs::write(&path, MINIMAL).unwrap();
        let err = StackLoader::load(&path).unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedFormat(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_service_entry_is_an_error() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.yaml"), dir.path().join("app1.yaml")).unwrap();

        let err = StackLoader::read_services_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SpecError::Walk(_)));
    }
}
