use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod infrastructure;
mod services;
mod stacks;
mod template;
mod ui;

use cli::{Cli, Commands, StackArg};
use commands::{deploy, generate, status};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    match cli.command {
        Commands::Generate {
            stack,
            env_file,
            output_dir,
            config,
        } => {
            generate::execute(stack.kinds(), env_file, output_dir, config)?;
        }
        Commands::Deploy {
            region,
            only,
            output_dir,
            config,
        } => {
            let kinds = only.unwrap_or(StackArg::All).kinds();
            deploy::execute(region, kinds, output_dir, config).await?;
        }
        Commands::Status { region, config } => {
            status::execute(region, config).await?;
        }
    }

    Ok(())
}
