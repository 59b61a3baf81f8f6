use std::sync::Arc;

use crate::{
    domain::application_template::{ApplicationTemplate, ApplicationType},
    domain::event_log::{EventLogEntry, EventType, RelatedObject},
    domain::identifiers::{TemplateId, UserId},
    domain::repository::{ApplicationTemplateRepository, AuditLog, TemplatePermissionRepository},
    domain::template_permission::ApplicationTemplateUserPermission,
    CoreError,
};

/// Service for registering templates and managing who may open them
pub struct TemplateService {
    templates: Arc<dyn ApplicationTemplateRepository>,
    permissions: Arc<dyn TemplatePermissionRepository>,
    audit_log: Arc<dyn AuditLog>,
}

impl TemplateService {
    /// Create a new template service
    pub fn new(
        templates: Arc<dyn ApplicationTemplateRepository>,
        permissions: Arc<dyn TemplatePermissionRepository>,
        audit_log: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            templates,
            permissions,
            audit_log,
        }
    }

    /// Validate and store a template
    pub async fn register(&self, template: ApplicationTemplate) -> Result<ApplicationTemplate, CoreError> {
        template.validate()?;
        self.templates.save(&template).await?;

        tracing::info!(
            template_id = %template.id,
            host_basename = %template.host_basename,
            application_type = %template.application_type,
            "Application template registered"
        );

        Ok(template)
    }

    /// Store a template as a tool, whatever type it was built with
    pub async fn register_tool(&self, template: ApplicationTemplate) -> Result<ApplicationTemplate, CoreError> {
        self.register(template.with_application_type(ApplicationType::Tool)).await
    }

    /// Store a template as a visualisation, whatever type it was built with
    pub async fn register_visualisation(
        &self,
        template: ApplicationTemplate,
    ) -> Result<ApplicationTemplate, CoreError> {
        self.register(template.with_application_type(ApplicationType::Visualisation))
            .await
    }

    /// Load a template or fail with `NotFound`
    pub async fn get(&self, id: &TemplateId) -> Result<ApplicationTemplate, CoreError> {
        self.templates
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Application template {}", id)))
    }

    /// Template served under a host basename
    pub async fn find_by_host_basename(
        &self,
        host_basename: &str,
    ) -> Result<Option<ApplicationTemplate>, CoreError> {
        self.templates.find_by_host_basename(host_basename).await
    }

    /// Visible tools
    pub async fn list_tools(&self) -> Result<Vec<ApplicationTemplate>, CoreError> {
        let tools = self.templates.list(Some(ApplicationType::Tool)).await?;
        Ok(tools.into_iter().filter(|t| t.visible).collect())
    }

    /// All visualisations
    pub async fn list_visualisations(&self) -> Result<Vec<ApplicationTemplate>, CoreError> {
        self.templates.list(Some(ApplicationType::Visualisation)).await
    }

    /// Allow `user` to open `template_id`
    pub async fn grant_access(&self, actor: UserId, user: UserId, template_id: &TemplateId) -> Result<(), CoreError> {
        let template = self.get(template_id).await?;
        self.permissions
            .grant(&ApplicationTemplateUserPermission::new(user, template.id))
            .await?;

        let entry = EventLogEntry::new(
            actor,
            EventType::TemplateAccessGranted,
            RelatedObject::ApplicationTemplate(template.id),
        )
        .with_extra(serde_json::json!({ "user": user.0 }));
        self.audit_log.log_event(&entry).await?;

        tracing::info!(template_id = %template.id, user = %user, "Template access granted");
        Ok(())
    }

    /// Withdraw `user`'s grant for `template_id`. Returns whether a grant existed.
    pub async fn revoke_access(&self, actor: UserId, user: UserId, template_id: &TemplateId) -> Result<bool, CoreError> {
        let revoked = self.permissions.revoke(&user, template_id).await?;

        if revoked {
            let entry = EventLogEntry::new(
                actor,
                EventType::TemplateAccessRevoked,
                RelatedObject::ApplicationTemplate(*template_id),
            )
            .with_extra(serde_json::json!({ "user": user.0 }));
            self.audit_log.log_event(&entry).await?;

            tracing::info!(template_id = %template_id, user = %user, "Template access revoked");
        }

        Ok(revoked)
    }

    /// Whether `user` may open `template`
    pub async fn user_has_access(&self, template: &ApplicationTemplate, user: &UserId) -> Result<bool, CoreError> {
        if !template.requires_authorization() {
            return Ok(true);
        }
        let granted = self.permissions.has_permission(user, &template.id).await?;
        Ok(template.user_has_access(granted))
    }
}
