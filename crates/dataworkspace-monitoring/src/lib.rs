//! Logging setup for Data Workspace processes.

use serde::{Deserialize, Serialize};

use dataworkspace_core::WorkspaceConfig;

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Filter directive used when `RUST_LOG` is not set
    pub log_filter: String,

    /// Emit JSON logs instead of human readable ones
    pub enable_json_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "dataworkspace".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl From<&WorkspaceConfig> for MonitoringConfig {
    fn from(config: &WorkspaceConfig) -> Self {
        Self {
            log_filter: config.log_filter.clone(),
            enable_json_logging: config.log_json,
            ..Default::default()
        }
    }
}
