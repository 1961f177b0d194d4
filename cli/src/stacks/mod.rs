//! Template generators, one per stack kind

pub mod certificate;
pub mod pipeline;
pub mod website;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::SiteEnv;
use crate::domain::StackKind;
use crate::error::SiteformError;
use crate::template::Template;

/// Build the template for `kind` from site values
pub fn build(kind: StackKind, env: &SiteEnv) -> Result<Template, SiteformError> {
    env.require_all(kind.required_keys())?;
    match kind {
        StackKind::Certificate => certificate::build(env),
        StackKind::Website => website::build(env),
        StackKind::Pipeline => pipeline::build(env),
    }
}

/// Build the template for `kind` and write it into `output_dir`
pub fn generate(kind: StackKind, env: &SiteEnv, output_dir: &Path) -> Result<PathBuf> {
    let template =
        build(kind, env).with_context(|| format!("Failed to build the {} template", kind))?;
    debug!(
        "{} template: {} resources",
        kind,
        template.resource_ids().count()
    );

    let path = output_dir.join(kind.template_file());
    template.write_to(&path)?;
    info!("Generated CloudFormation template: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvKey;

    fn full_env() -> SiteEnv {
        SiteEnv::from_pairs([
            (EnvKey::DomainName, "example.com"),
            (EnvKey::HostedZoneId, "Z0123456789"),
            (EnvKey::GithubUserName, "octocat"),
            (EnvKey::GithubRepoName, "portfolio"),
            (
                EnvKey::GithubAppConnectionArn,
                "arn:aws:codestar-connections:us-west-2:123456789012:connection/abc",
            ),
        ])
    }

    #[test]
    fn test_generate_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let env = full_env();

        for kind in StackKind::ALL {
            let path = generate(kind, &env, dir.path()).unwrap();
            assert_eq!(path.file_name().unwrap(), kind.template_file());

            let content = std::fs::read_to_string(&path).unwrap();
            let doc: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
            assert_eq!(doc["AWSTemplateFormatVersion"].as_str(), Some("2010-09-09"));
            assert!(doc["Resources"].as_mapping().is_some());
        }
    }

    #[test]
    fn test_certificate_needs_no_github_values() {
        let env = SiteEnv::from_pairs([
            (EnvKey::DomainName, "example.com"),
            (EnvKey::HostedZoneId, "Z0123456789"),
        ]);
        assert!(build(StackKind::Certificate, &env).is_ok());
        assert!(build(StackKind::Website, &env).is_ok());
        assert!(build(StackKind::Pipeline, &env).is_err());
    }

    #[test]
    fn test_missing_value_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let env = SiteEnv::default();

        let err = generate(StackKind::Website, &env, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("DOMAIN_NAME"));
        assert!(!dir.path().join(StackKind::Website.template_file()).exists());
    }

    #[test]
    fn test_pipeline_yaml_mentions_repository() {
        let template = build(StackKind::Pipeline, &full_env()).unwrap();
        let yaml = template.to_yaml().unwrap();
        assert!(yaml.contains("https://github.com/octocat/portfolio"));
        assert!(yaml.contains("CodePipelinePolicy-example-com"));
    }
}
