//! portal-access CLI - offline evaluation of role-assignment and access scenarios.
//!
//! Provides commands for resolving assignment trees, checking the
//! authorization gate, and inspecting the service configuration.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check, config, resolve};
use output::OutputFormat;

/// Exit status when a resolution is rejected or the gate denies.
const EXIT_DENIED: i32 = 2;

/// portal-access - Hierarchical role-assignment and authorization engine CLI
#[derive(Parser)]
#[command(
    name = "portal-access",
    version = "0.1.0",
    about = "Resolve role assignments and check access over Customer / Portfolio / Site",
    long_about = "Evaluates assignment requests and authorization decisions from scenario files, \
                  without any running service.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a desired assignment tree into the target assignment list
    Resolve(resolve::ResolveArgs),

    /// Evaluate the authorization gate
    #[command(subcommand)]
    Check(check::CheckCommands),

    /// Configuration inspection
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.output;

    let result = match cli.command {
        Commands::Resolve(args) => resolve::execute(args, format),
        Commands::Check(cmd) => check::execute(cmd, format),
        Commands::Config(cmd) => config::execute(cmd, format).map(|_| true),
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(EXIT_DENIED),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
