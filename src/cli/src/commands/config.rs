//! Configuration commands.
//!
//! Shows the service configuration the library would load: defaults, an
//! optional file, and `PORTAL_ACCESS__*` environment variables on top.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use portal_access::config::Config;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Configuration file layered under the environment
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

pub fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show { file } => {
            let config = match &file {
                Some(path) => Config::from_file(&path.to_string_lossy())
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => Config::load().context("Failed to load configuration")?,
            };

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    if let Some(path) = &file {
                        output::print_info(&format!("File: {}", path.display()));
                    }
                    output::print_detail("service_name", &config.service_name);
                    output::print_detail("environment", &config.environment);
                    output::print_detail("logging.level", &config.logging.level);
                    output::print_detail("logging.format", &format!("{:?}", config.logging.format));
                    output::print_detail(
                        "notifications.enabled",
                        &config.notifications.enabled.to_string(),
                    );
                    output::print_detail(
                        "notifications.portal_base_url",
                        &config.notifications.portal_base_url,
                    );
                    output::print_detail(
                        "notifications.max_sites_in_title",
                        &config.notifications.max_sites_in_title.to_string(),
                    );
                }
                _ => output::print_item(&config, format)?,
            }
        }
    }

    Ok(())
}
