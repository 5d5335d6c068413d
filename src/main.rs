// ABOUTME: Entry point for the ephemeron CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use ephemeron::config;
use ephemeron::error::Result;
use ephemeron::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG; otherwise default to warnings only
    let filter = if cli.verbose {
        EnvFilter::new("ephemeron=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    match run(cli, output.clone()).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli, output: Output) -> Result<i32> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { project, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, project.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(0)
        }
        Commands::Deploy {
            environments,
            run_id,
        } => commands::deploy(config_path, &environments, run_id.as_deref(), output).await,
        Commands::Teardown {
            environment,
            instance,
        } => commands::teardown(config_path, &environment, &instance, output).await,
        Commands::Rollback {
            environment,
            previous,
        } => commands::rollback(config_path, &environment, previous, output).await,
        Commands::Status { environment } => commands::status(config_path, &environment, output),
    }
}
