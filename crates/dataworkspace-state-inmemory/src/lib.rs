//! In-memory state store implementation for Data Workspace
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in the dataworkspace-core crate. It is primarily useful
//! for development, testing, and deployments where persistence is not required.
//!
//! All tables live behind one lock. Every repository operation holds it for
//! its whole duration, so each operation is atomic and isolated from the
//! others, including the approval save and its audit event.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub mod repositories;
pub use repositories::{
    InMemoryApplicationInstanceRepository, InMemoryApplicationTemplateRepository, InMemoryAuditLog,
    InMemoryDbUserRepository, InMemoryReferenceDatasetFieldRepository,
    InMemoryTemplatePermissionRepository, InMemoryVisualisationApprovalRepository,
};

use dataworkspace_core::{
    ApplicationInstance, ApplicationInstanceDbUser, ApplicationTemplate,
    ApplicationTemplateUserPermission, ApprovalId, DatasetFieldId, DbUserId, EventLogEntry,
    InstanceId, ReferenceDatasetField, Repositories, TemplateId, VisualisationApproval,
};

/// Every table of the store
#[derive(Debug, Default)]
pub struct Tables {
    pub(crate) templates: HashMap<TemplateId, ApplicationTemplate>,
    pub(crate) instances: HashMap<InstanceId, ApplicationInstance>,
    pub(crate) approvals: HashMap<ApprovalId, VisualisationApproval>,
    pub(crate) permissions: HashSet<ApplicationTemplateUserPermission>,
    pub(crate) events: Vec<EventLogEntry>,
    pub(crate) db_users: HashMap<DbUserId, ApplicationInstanceDbUser>,
    pub(crate) dataset_fields: HashMap<DatasetFieldId, ReferenceDatasetField>,
}

/// Tables shared by all repositories of one store
pub type SharedTables = Arc<RwLock<Tables>>;

/// Provider for in-memory state store repositories
pub struct InMemoryStateStoreProvider {
    tables: SharedTables,
}

impl InMemoryStateStoreProvider {
    /// Create a new, empty in-memory state store provider
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Create repositories sharing this provider's tables
    pub fn create_repositories(&self) -> Repositories {
        debug!("Creating in-memory repositories");

        Repositories {
            templates: Arc::new(InMemoryApplicationTemplateRepository::new(self.tables.clone())),
            instances: Arc::new(InMemoryApplicationInstanceRepository::new(self.tables.clone())),
            approvals: Arc::new(InMemoryVisualisationApprovalRepository::new(self.tables.clone())),
            permissions: Arc::new(InMemoryTemplatePermissionRepository::new(self.tables.clone())),
            audit_log: Arc::new(InMemoryAuditLog::new(self.tables.clone())),
            db_users: Arc::new(InMemoryDbUserRepository::new(self.tables.clone())),
            dataset_fields: Arc::new(InMemoryReferenceDatasetFieldRepository::new(self.tables.clone())),
        }
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
