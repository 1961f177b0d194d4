//! Status command - show what is deployed for each site stack

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::DeploySettings;
use crate::domain::{StackKind, StackPhase};
use crate::infrastructure::{CfnStackClient, StackDescription};
use crate::services::StackClients;
use crate::ui;

pub async fn execute(region: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let settings = DeploySettings::load(config.as_deref())?;
    let region = region.unwrap_or_else(|| settings.default_region.clone());

    ui::print_header(&format!("Site stack status ({})", region));

    let clients = StackClients {
        certificate: Box::new(CfnStackClient::connect(&settings.certificate_region).await),
        main: Box::new(CfnStackClient::connect(&region).await),
    };

    for kind in StackKind::ALL {
        let client = clients.for_kind(kind);
        let name = settings.stacks.for_kind(kind);
        let description = client.describe_stack(name).await?;

        println!("{} [{}]", name.bold(), client.region());
        match description {
            Some(stack) => print_stack(&stack),
            None => ui::print_warning("not deployed"),
        }
        println!();
    }

    Ok(())
}

fn print_stack(stack: &StackDescription) {
    let status = match StackPhase::classify(&stack.status) {
        StackPhase::Succeeded => stack.status.bright_green(),
        StackPhase::InProgress => stack.status.bright_yellow(),
        StackPhase::RolledBack | StackPhase::Failed => stack.status.bright_red(),
    };
    println!("  Status:       {}", status);
    if let Some(reason) = &stack.status_reason {
        println!("  Reason:       {}", reason.dimmed());
    }
    println!("  Last updated: {}", format_time(stack.last_updated));

    let mut outputs: Vec<_> = stack.outputs.iter().collect();
    outputs.sort();
    for (key, value) in outputs {
        println!("  {:<14}{}", format!("{}:", key), value);
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    }
}
