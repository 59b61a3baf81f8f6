//!
//! Data Workspace Core - domain models and services for applications
//!
//! This crate defines the application templates, instances, visualisation
//! approvals and access grants of the Data Workspace platform, the
//! invariants that govern them, and the repository interfaces that store
//! crates implement.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - entities, value objects and business rules
pub mod domain;

/// Application services - use cases over the repositories
pub mod application;

/// Configuration loading
pub mod config;

/// Error types
pub mod error;

// Re-export key types
pub use error::{ApprovalTransitionError, CoreError};

pub use config::{DatabaseSettings, SiteSettings, WorkspaceConfig};

pub use application::Repositories;
pub use application::approval_service::ApprovalService;
pub use application::instance_service::InstanceLifecycleService;
pub use application::site_context::SiteContext;
pub use application::template_service::TemplateService;

pub use domain::application_instance::{
    ApplicationInstance, InstanceState, LaunchRequest, SpawnerReport,
};
pub use domain::application_template::{
    ApplicationTemplate, ApplicationType, SpawnerKind, UserAccessType, WrapMode,
};
pub use domain::dataset_field::{DatasetFieldName, ReferenceDatasetField};
pub use domain::db_user::ApplicationInstanceDbUser;
pub use domain::event_log::{EventLogEntry, EventType, RelatedObject};
pub use domain::identifiers::{
    ApprovalId, DatabaseId, DatasetFieldId, DbUserId, EventId, InstanceId, ReferenceDatasetId,
    TemplateId, UserId,
};
pub use domain::repository::{
    ApplicationInstanceRepository, ApplicationTemplateRepository, AuditLog, DbUserRepository,
    ReferenceDatasetFieldRepository, TemplatePermissionRepository, VisualisationApprovalRepository,
};
pub use domain::template_permission::ApplicationTemplateUserPermission;
pub use domain::visualisation_approval::{
    check_approval_transition, ApprovalSave, VisualisationApproval,
};
