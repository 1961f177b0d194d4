//! Deployment settings (`siteform.yaml`).

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::region;
use crate::domain::stack::StackKind;
use crate::error::ConfigError;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_SETTINGS_FILE: &str = "siteform.yaml";

/// Stack names per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackNames {
    #[serde(default = "default_certificate_stack")]
    pub certificate: String,

    #[serde(default = "default_website_stack")]
    pub website: String,

    #[serde(default = "default_pipeline_stack")]
    pub pipeline: String,
}

fn default_certificate_stack() -> String {
    StackKind::Certificate.default_stack_name().to_string()
}

fn default_website_stack() -> String {
    StackKind::Website.default_stack_name().to_string()
}

fn default_pipeline_stack() -> String {
    StackKind::Pipeline.default_stack_name().to_string()
}

impl Default for StackNames {
    fn default() -> Self {
        Self {
            certificate: default_certificate_stack(),
            website: default_website_stack(),
            pipeline: default_pipeline_stack(),
        }
    }
}

impl StackNames {
    pub fn for_kind(&self, kind: StackKind) -> &str {
        match kind {
            StackKind::Certificate => &self.certificate,
            StackKind::Website => &self.website,
            StackKind::Pipeline => &self.pipeline,
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Stack names
    #[serde(default)]
    pub stacks: StackNames,

    /// Region for the certificate stack (CloudFront only accepts us-east-1 certificates)
    #[serde(default = "default_certificate_region")]
    pub certificate_region: String,

    /// Region for the website and pipeline stacks when `--region` is not given
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Delay between DescribeStacks polls
    #[serde(default = "default_poll_interval", with = "duration_str")]
    pub poll_interval: Duration,

    /// Upper bound on waiting for one stack operation
    #[serde(default = "default_timeout", with = "duration_str")]
    pub timeout: Duration,

    /// Directory generated templates are written to and read from
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_certificate_region() -> String {
    region::CERTIFICATE_REGION.to_string()
}

fn default_region() -> String {
    region::DEFAULT_REGION.to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            stacks: StackNames::default(),
            certificate_region: default_certificate_region(),
            default_region: default_region(),
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
            output_dir: default_output_dir(),
        }
    }
}

impl DeploySettings {
    /// Load settings.
    ///
    /// An explicit path must exist. Without one, `siteform.yaml` in the
    /// working directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let stack_name = Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$")
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;

        for kind in StackKind::ALL {
            let name = self.stacks.for_kind(kind);
            if !stack_name.is_match(name) {
                return Err(ConfigError::InvalidValue {
                    field: format!("stacks.{}", kind.key()),
                    value: name.to_string(),
                });
            }
        }

        region::validate(&self.certificate_region)?;
        region::validate(&self.default_region)?;

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval".to_string(),
                value: "0s".to_string(),
            });
        }

        Ok(())
    }

    /// Path of the generated template for `kind`
    pub fn template_path(&self, kind: StackKind) -> PathBuf {
        self.output_dir.join(kind.template_file())
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DeploySettings::default();
        assert_eq!(settings.stacks.certificate, "acm-certificate-stack");
        assert_eq!(settings.stacks.website, "portfolio-website-stack");
        assert_eq!(settings.stacks.pipeline, "cicd-pipeline-stack");
        assert_eq!(settings.certificate_region, "us-east-1");
        assert_eq!(settings.default_region, "us-west-2");
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = DeploySettings::from_yaml(
            r#"
stacks:
  website: my-site
poll_interval: 3s
timeout: 15m
output_dir: build/templates
"#,
        )
        .unwrap();

        assert_eq!(settings.stacks.website, "my-site");
        assert_eq!(settings.stacks.pipeline, "cicd-pipeline-stack");
        assert_eq!(settings.poll_interval, Duration::from_secs(3));
        assert_eq!(settings.timeout, Duration::from_secs(15 * 60));
        assert_eq!(
            settings.template_path(StackKind::Website),
            PathBuf::from("build/templates/portfolio-website-stack.yaml")
        );
    }

    #[test]
    fn test_invalid_stack_name() {
        let err = DeploySettings::from_yaml("stacks:\n  certificate: 1-bad_name\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "stacks.certificate"));
    }

    #[test]
    fn test_invalid_region() {
        let err = DeploySettings::from_yaml("default_region: mars-north-1\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion { .. }));
    }

    #[test]
    fn test_bad_duration() {
        let err = DeploySettings::from_yaml("poll_interval: soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DeploySettings::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}
