//! Repository traits for Data Workspace applications
//!
//! These traits are the persistence seam of the domain. Store crates
//! implement them and are responsible for the store-level guarantees noted on
//! each method: uniqueness constraints and the transaction around approval
//! saves.

use async_trait::async_trait;

use super::application_instance::{ApplicationInstance, InstanceState};
use super::application_template::{ApplicationTemplate, ApplicationType};
use super::dataset_field::ReferenceDatasetField;
use super::db_user::ApplicationInstanceDbUser;
use super::event_log::{EventLogEntry, RelatedObject};
use super::identifiers::{ApprovalId, InstanceId, ReferenceDatasetId, TemplateId, UserId};
use super::template_permission::ApplicationTemplateUserPermission;
use super::visualisation_approval::{ApprovalSave, VisualisationApproval};
use crate::CoreError;

/// Repository for application templates
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ApplicationTemplateRepository: Send + Sync {
    /// Find a template by ID
    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<ApplicationTemplate>, CoreError>;

    /// Find the template served under a host basename
    async fn find_by_host_basename(
        &self,
        host_basename: &str,
    ) -> Result<Option<ApplicationTemplate>, CoreError>;

    /// Insert or update a template.
    ///
    /// Fails with [`CoreError::IntegrityError`] when another template already
    /// uses the host basename or GitLab project id.
    async fn save(&self, template: &ApplicationTemplate) -> Result<(), CoreError>;

    /// Delete a template
    async fn delete(&self, id: &TemplateId) -> Result<(), CoreError>;

    /// List templates, optionally of one type
    async fn list(
        &self,
        application_type: Option<ApplicationType>,
    ) -> Result<Vec<ApplicationTemplate>, CoreError>;
}

/// Repository for application instances
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ApplicationInstanceRepository: Send + Sync {
    /// Find an instance by ID
    async fn find_by_id(&self, id: &InstanceId) -> Result<Option<ApplicationInstance>, CoreError>;

    /// Insert a new instance.
    ///
    /// Fails with [`CoreError::IntegrityError`] when the instance is active
    /// and another active instance already holds its public host.
    async fn create(&self, instance: &ApplicationInstance) -> Result<(), CoreError>;

    /// Update an existing instance, with the same uniqueness guarantee as `create`.
    ///
    /// The stored row is read and merged with
    /// [`ApplicationInstance::accept_update`] before writing, so a stale copy
    /// cannot move the state backwards.
    async fn save(&self, instance: &ApplicationInstance) -> Result<(), CoreError>;

    /// The instance currently holding `public_host`, if any
    async fn find_active_for_host(
        &self,
        public_host: &str,
    ) -> Result<Option<ApplicationInstance>, CoreError>;

    /// Instances launched by `owner`, newest first
    async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<ApplicationInstance>, CoreError>;

    /// Instances, optionally filtered by state
    async fn list(&self, state: Option<InstanceState>) -> Result<Vec<ApplicationInstance>, CoreError>;
}

/// Repository for visualisation approvals
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait VisualisationApprovalRepository: Send + Sync {
    /// Find an approval by ID
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<VisualisationApproval>, CoreError>;

    /// Save an approval and record its audit event.
    ///
    /// The stored record is read, checked with
    /// [`VisualisationApproval::prepare_save`], written, and the event
    /// appended to the audit log, all in one transaction.
    async fn save(&self, approval: &VisualisationApproval) -> Result<ApprovalSave, CoreError>;

    /// Approvals for a visualisation, oldest first
    async fn list_for_visualisation(
        &self,
        visualisation: &TemplateId,
    ) -> Result<Vec<VisualisationApproval>, CoreError>;
}

/// Repository for per-user template grants
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait TemplatePermissionRepository: Send + Sync {
    /// Add a grant. Fails with [`CoreError::IntegrityError`] if it exists.
    async fn grant(&self, permission: &ApplicationTemplateUserPermission) -> Result<(), CoreError>;

    /// Remove a grant, returning whether one existed
    async fn revoke(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError>;

    /// Whether the user holds a grant for the template
    async fn has_permission(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError>;

    /// Templates the user holds grants for
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<TemplateId>, CoreError>;
}

/// Append-only audit log
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an event
    async fn log_event(&self, entry: &EventLogEntry) -> Result<(), CoreError>;

    /// Events about an object, oldest first
    async fn list_for_object(&self, related: &RelatedObject) -> Result<Vec<EventLogEntry>, CoreError>;
}

/// Repository for database users created for instances
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait DbUserRepository: Send + Sync {
    /// Record a database user
    async fn create(&self, db_user: &ApplicationInstanceDbUser) -> Result<(), CoreError>;

    /// Database users of an instance
    async fn list_for_instance(
        &self,
        instance: &InstanceId,
    ) -> Result<Vec<ApplicationInstanceDbUser>, CoreError>;

    /// Database users with a given username, across all databases
    async fn find_by_username(&self, db_username: &str) -> Result<Vec<ApplicationInstanceDbUser>, CoreError>;
}

/// Repository for reference dataset fields
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ReferenceDatasetFieldRepository: Send + Sync {
    /// Insert or update a field
    async fn save(&self, field: &ReferenceDatasetField) -> Result<(), CoreError>;

    /// Fields of a dataset, in name order
    async fn list_for_dataset(
        &self,
        dataset: &ReferenceDatasetId,
    ) -> Result<Vec<ReferenceDatasetField>, CoreError>;
}
