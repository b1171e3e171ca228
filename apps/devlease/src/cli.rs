//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// devlease - host resource injection for container-creation requests
#[derive(Parser)]
#[command(name = "devlease")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Host resource injection for container-creation requests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "DEVLEASE_CONFIG",
        default_value = "/etc/devlease/config.toml"
    )]
    pub config: PathBuf,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run device discovery and show the pool
    Discover,

    /// Dry-run the injection against a create request read from a JSON
    /// file and print the manipulated request
    Apply {
        /// Path to a create-request JSON file
        #[arg(long, value_name = "PATH")]
        request: PathBuf,
    },
}
