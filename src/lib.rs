//! Data Workspace applications
//!
//! Wires the domain services of `dataworkspace-core` to a state store chosen
//! from configuration, and sets up logging.

#![forbid(unsafe_code)]

use anyhow::Context;
use tracing::info;

pub use dataworkspace_core;
pub use dataworkspace_monitoring;
pub use dataworkspace_state_inmemory;
#[cfg(feature = "postgres")]
pub use dataworkspace_state_postgres;

use dataworkspace_core::{
    ApprovalService, InstanceLifecycleService, Repositories, SiteContext, TemplateService,
    WorkspaceConfig,
};
use dataworkspace_monitoring::{LogExt, MonitoringConfig};
use dataworkspace_state_inmemory::InMemoryStateStoreProvider;

/// Configured services over one state store
#[derive(Clone)]
pub struct Workspace {
    config: WorkspaceConfig,
    repositories: Repositories,
}

impl Workspace {
    /// Load configuration from the environment, initialize logging and connect
    pub async fn bootstrap() -> anyhow::Result<Self> {
        let config = WorkspaceConfig::load().context("Failed to load configuration")?;
        dataworkspace_monitoring::init_logging(&MonitoringConfig::from(&config))?;
        Self::connect(config).await.log_err("Failed to start workspace")
    }

    /// Connect to the store selected by `config`.
    ///
    /// A database URL selects PostgreSQL when built with the `postgres`
    /// feature. Otherwise state is kept in memory.
    pub async fn connect(config: WorkspaceConfig) -> anyhow::Result<Self> {
        let repositories = match &config.database.url {
            #[cfg(feature = "postgres")]
            Some(_) => {
                let pg_config = dataworkspace_state_postgres::PostgresConfig::from_settings(&config.database)?;
                let provider = dataworkspace_state_postgres::PostgresStateStoreProvider::with_config(pg_config)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                info!("Using PostgreSQL state store");
                provider.create_repositories()
            }
            #[cfg(not(feature = "postgres"))]
            Some(_) => {
                tracing::warn!("DATABASE_URL is set but PostgreSQL support is not compiled in; using in-memory state store");
                InMemoryStateStoreProvider::new().create_repositories()
            }
            None => {
                info!("Using in-memory state store");
                InMemoryStateStoreProvider::new().create_repositories()
            }
        };

        Ok(Self::with_repositories(config, repositories))
    }

    /// A workspace backed by a fresh in-memory store
    pub fn in_memory(config: WorkspaceConfig) -> Self {
        Self::with_repositories(config, InMemoryStateStoreProvider::new().create_repositories())
    }

    /// A workspace over existing repositories
    pub fn with_repositories(config: WorkspaceConfig, repositories: Repositories) -> Self {
        Self { config, repositories }
    }

    /// Loaded configuration
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Repositories of the selected store
    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    /// Template catalogue and access grants
    pub fn templates(&self) -> TemplateService {
        self.repositories.template_service()
    }

    /// Instance lifecycle
    pub fn instances(&self) -> InstanceLifecycleService {
        self.repositories.instance_service()
    }

    /// Visualisation approvals
    pub fn approvals(&self) -> ApprovalService {
        self.repositories.approval_service()
    }

    /// Common page context for a request made over `scheme`
    pub fn site_context(&self, scheme: &str) -> SiteContext {
        SiteContext::common(scheme, &self.config.site)
    }
}
