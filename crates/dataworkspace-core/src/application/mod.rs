use std::sync::Arc;

use crate::domain::repository::{
    ApplicationInstanceRepository, ApplicationTemplateRepository, AuditLog, DbUserRepository,
    ReferenceDatasetFieldRepository, TemplatePermissionRepository, VisualisationApprovalRepository,
};

/// Template registration and access grants
pub mod template_service;

/// Instance launch and spawner-reported lifecycle
pub mod instance_service;

/// Visualisation approvals
pub mod approval_service;

/// Common page context
pub mod site_context;

use approval_service::ApprovalService;
use instance_service::InstanceLifecycleService;
use template_service::TemplateService;

/// The full set of repositories a state store provides
#[derive(Clone)]
pub struct Repositories {
    /// Application templates
    pub templates: Arc<dyn ApplicationTemplateRepository>,
    /// Application instances
    pub instances: Arc<dyn ApplicationInstanceRepository>,
    /// Visualisation approvals
    pub approvals: Arc<dyn VisualisationApprovalRepository>,
    /// Per-user template grants
    pub permissions: Arc<dyn TemplatePermissionRepository>,
    /// Audit log
    pub audit_log: Arc<dyn AuditLog>,
    /// Instance database users
    pub db_users: Arc<dyn DbUserRepository>,
    /// Reference dataset fields
    pub dataset_fields: Arc<dyn ReferenceDatasetFieldRepository>,
}

impl Repositories {
    /// Build a template service over these repositories
    pub fn template_service(&self) -> TemplateService {
        TemplateService::new(
            self.templates.clone(),
            self.permissions.clone(),
            self.audit_log.clone(),
        )
    }

    /// Build an instance lifecycle service over these repositories
    pub fn instance_service(&self) -> InstanceLifecycleService {
        InstanceLifecycleService::new(
            self.templates.clone(),
            self.instances.clone(),
            self.permissions.clone(),
            self.db_users.clone(),
            self.audit_log.clone(),
        )
    }

    /// Build an approval service over these repositories
    pub fn approval_service(&self) -> ApprovalService {
        ApprovalService::new(self.templates.clone(), self.approvals.clone())
    }
}
