//! CLI definitions for siteform
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::domain::region::parse_region;
use crate::domain::StackKind;

#[derive(Parser)]
#[command(
    name = "siteform",
    version,
    about = "Static website infrastructure on CloudFormation",
    long_about = "Generates and deploys the CloudFormation stacks behind a static website:\nACM certificate, S3 + CloudFront hosting with Route53 records, and a CodePipeline CI/CD pipeline."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate CloudFormation templates from site values
    Generate {
        /// Which template to generate
        #[arg(value_enum, default_value = "all")]
        stack: StackArg,

        /// File holding DOMAIN_NAME, HOSTED_ZONE_ID and the GitHub values
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,

        /// Directory templates are written to (overrides siteform.yaml)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Settings file (defaults to ./siteform.yaml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create or update the stacks from generated templates
    Deploy {
        /// Region for the website and pipeline stacks
        #[arg(long, value_parser = parse_region)]
        region: Option<String>,

        /// Deploy a single stack, reading its parameters from deployed upstream stacks
        #[arg(long, value_enum)]
        only: Option<StackArg>,

        /// Directory templates are read from (overrides siteform.yaml)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Settings file (defaults to ./siteform.yaml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show status, last update and outputs of each stack
    Status {
        /// Region of the website and pipeline stacks
        #[arg(long, value_parser = parse_region)]
        region: Option<String>,

        /// Settings file (defaults to ./siteform.yaml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Stack selector on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StackArg {
    Certificate,
    Website,
    Pipeline,
    All,
}

impl StackArg {
    /// Stack kinds selected, in deploy order
    pub fn kinds(&self) -> Vec<StackKind> {
        match self {
            Self::Certificate => vec![StackKind::Certificate],
            Self::Website => vec![StackKind::Website],
            Self::Pipeline => vec![StackKind::Pipeline],
            Self::All => StackKind::ALL.to_vec(),
        }
    }
}
