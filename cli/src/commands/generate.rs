//! Generate command - write CloudFormation templates from site values

use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

use crate::config::{DeploySettings, SiteEnv};
use crate::domain::StackKind;
use crate::stacks;
use crate::ui;

pub fn execute(
    kinds: Vec<StackKind>,
    env_file: PathBuf,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    ui::print_header("Generating CloudFormation templates");

    let settings = DeploySettings::load(config.as_deref())?;
    let output_dir = output_dir.unwrap_or(settings.output_dir);
    debug!(
        "Reading site values from {} (output: {})",
        env_file.display(),
        output_dir.display()
    );
    let env = SiteEnv::load(&env_file)?;

    let total = kinds.len();
    for (index, kind) in kinds.into_iter().enumerate() {
        ui::print_step(index + 1, total, &format!("{} template", kind));
        let path = stacks::generate(kind, &env, &output_dir)?;
        ui::print_success(&format!("Wrote {}", path.display()));
    }

    println!();
    ui::print_info("Run `siteform deploy` to create or update the stacks.");
    Ok(())
}
