//! Configuration for Data Workspace applications
//!
//! Values are read from environment variables over built-in defaults.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::CoreError;

/// Settings used to build the common page context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Domain under which applications are served
    pub application_root_domain: String,

    /// Google Analytics property
    #[serde(default)]
    pub google_analytics_site_id: Option<String>,

    /// Google Tag Manager container
    #[serde(default)]
    pub gtm_container_id: Option<String>,

    /// Google Tag Manager environment query parameters
    #[serde(default)]
    pub gtm_container_environment_params: Option<String>,
}

/// Connection settings for the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection string. `None` selects the in-memory store.
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout for acquiring a connection from the pool (in seconds)
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Whether to run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

fn default_log_filter() -> String {
    "info,dataworkspace=debug".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Page context settings
    pub site: SiteSettings,

    /// Store settings
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Log filter directive (e.g., "info,dataworkspace=debug")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON logs instead of human readable ones
    #[serde(default)]
    pub log_json: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            site: SiteSettings::default(),
            database: DatabaseSettings::default(),
            log_filter: default_log_filter(),
            log_json: false,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl WorkspaceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self, CoreError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with defaults
        let mut config = Self::default();

        if let Some(domain) = lookup("APPLICATION_ROOT_DOMAIN") {
            config.site.application_root_domain = domain;
        }
        config.site.google_analytics_site_id = lookup("GOOGLE_ANALYTICS_SITE_ID");
        config.site.gtm_container_id = lookup("GTM_CONTAINER_ID");
        config.site.gtm_container_environment_params = lookup("GTM_CONTAINER_ENVIRONMENT_PARAMS");

        config.database.url = lookup("DATABASE_URL");

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => config.database.max_connections = max,
                Err(_) => warn!("Invalid DATABASE_MAX_CONNECTIONS value: {}", max),
            }
        }

        if let Some(timeout) = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(timeout) => config.database.acquire_timeout_secs = timeout,
                Err(_) => warn!("Invalid DATABASE_ACQUIRE_TIMEOUT_SECS value: {}", timeout),
            }
        }

        if let Some(run) = lookup("DATABASE_RUN_MIGRATIONS") {
            match parse_bool(&run) {
                Some(run) => config.database.run_migrations = run,
                None => warn!("Invalid DATABASE_RUN_MIGRATIONS value: {}", run),
            }
        }

        if let Some(filter) = lookup("LOG_FILTER") {
            config.log_filter = filter;
        }

        if let Some(json) = lookup("LOG_JSON") {
            match parse_bool(&json) {
                Some(json) => config.log_json = json,
                None => warn!("Invalid LOG_JSON value: {}", json),
            }
        }

        // Validate required fields
        if config.site.application_root_domain.is_empty() {
            return Err(CoreError::ConfigurationError(
                "APPLICATION_ROOT_DOMAIN is required".to_string(),
            ));
        }

        if config.database.url.is_none() {
            warn!("No DATABASE_URL provided - state will be kept in memory only");
        }

        info!("Loaded workspace configuration");
        Ok(config)
    }
}
