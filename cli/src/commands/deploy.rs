//! Deploy command - push generated templates to CloudFormation

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

use crate::config::DeploySettings;
use crate::domain::StackKind;
use crate::error::SiteformError;
use crate::infrastructure::CfnStackClient;
use crate::services::{DeployService, StackClients};
use crate::ui;

pub async fn execute(
    region: Option<String>,
    kinds: Vec<StackKind>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut settings = DeploySettings::load(config.as_deref())?;
    if let Some(dir) = output_dir {
        settings.output_dir = dir;
    }
    let region = region.unwrap_or_else(|| settings.default_region.clone());

    ui::print_header(&format!("Deploying site stacks to {}", region));
    info!(
        "Certificate region: {}, target region: {}",
        settings.certificate_region, region
    );

    let templates = load_templates(&settings, &kinds)?;

    let clients = StackClients {
        certificate: Box::new(CfnStackClient::connect(&settings.certificate_region).await),
        main: Box::new(CfnStackClient::connect(&region).await),
    };

    let service = DeployService::new(&settings);
    let deployed = match service.deploy(&clients, &templates, &kinds).await {
        Ok(deployed) => deployed,
        Err(e) => {
            ui::print_error("Deployment failed");
            return Err(SiteformError::from(e).into());
        }
    };

    service.print_summary(&deployed);
    ui::print_success("All stacks deployed successfully");
    Ok(())
}

/// Read the generated template of every stack about to be deployed
fn load_templates(
    settings: &DeploySettings,
    kinds: &[StackKind],
) -> Result<HashMap<StackKind, String>> {
    let mut templates = HashMap::new();
    for &kind in kinds {
        let path = settings.template_path(kind);
        let body = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read {} (run `siteform generate {}` first)",
                path.display(),
                kind
            )
        })?;
        templates.insert(kind, body);
    }
    Ok(templates)
}
