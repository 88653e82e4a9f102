//! Configuration management.
//!
//! Every section has defaults, so an empty environment yields a usable
//! configuration. Environment variables use the `PORTAL_ACCESS` prefix and
//! `__` as the section separator, e.g. `PORTAL_ACCESS__NOTIFICATIONS__ENABLED`.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::telemetry::LoggingConfig;

const ENV_PREFIX: &str = "PORTAL_ACCESS";

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Send e-mails after create/update
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,

    /// Base URL of the portal, used as the login link
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,

    /// Site names listed in a notification subject before truncating
    #[serde(default = "default_max_sites_in_title")]
    pub max_sites_in_title: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            portal_base_url: default_portal_base_url(),
            max_sites_in_title: default_max_sites_in_title(),
        }
    }
}

// Default value functions
fn default_service_name() -> String { "portal-access".to_string() }
fn default_environment() -> String { "development".to_string() }
fn default_notifications_enabled() -> bool { true }
fn default_portal_base_url() -> String { "https://portal.example.com".to_string() }
fn default_max_sites_in_title() -> usize { 3 }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a file, with the environment layered on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
