// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use ephemeron::types::EnvironmentName;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ephemeron")]
#[command(about = "Deploy to a throwaway cloud instance and always tear it down")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ephemeron.yml configuration file
    Init {
        /// Project name used in tags and naming templates
        #[arg(short, long)]
        project: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the deploy pipeline on a fresh instance per environment
    Deploy {
        /// Target environment; repeat to deploy several concurrently
        #[arg(short, long = "env", required = true)]
        environments: Vec<EnvironmentName>,

        /// Run id prefix (default: start timestamp)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Terminate an instance left behind by an earlier run
    Teardown {
        /// Environment whose provider settings to use
        #[arg(short, long = "env")]
        environment: EnvironmentName,

        /// Instance id to terminate
        #[arg(long)]
        instance: String,
    },

    /// Roll back the persistent service of an environment
    Rollback {
        /// Target environment
        #[arg(short, long = "env")]
        environment: EnvironmentName,

        /// Move to the previous descriptor revision instead of restarting in place
        #[arg(long)]
        previous: bool,
    },

    /// Show the resolved settings for an environment
    Status {
        /// Target environment
        #[arg(short, long = "env")]
        environment: EnvironmentName,
    },
}
