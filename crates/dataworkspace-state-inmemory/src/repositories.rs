use async_trait::async_trait;
use tracing::{debug, warn};

use dataworkspace_core::{
    ApplicationInstance, ApplicationInstanceDbUser, ApplicationInstanceRepository,
    ApplicationTemplate, ApplicationTemplateRepository, ApplicationTemplateUserPermission,
    ApplicationType, ApprovalId, ApprovalSave, AuditLog, CoreError, DbUserRepository,
    EventLogEntry, InstanceId, InstanceState, ReferenceDatasetField,
    ReferenceDatasetFieldRepository, ReferenceDatasetId, RelatedObject, TemplateId,
    TemplatePermissionRepository, UserId, VisualisationApproval, VisualisationApprovalRepository,
};

use crate::{SharedTables, Tables};

fn integrity_error(constraint: &str, detail: String) -> CoreError {
    warn!(constraint = %constraint, "{}", detail);
    CoreError::IntegrityError(format!("{}: {}", constraint, detail))
}

fn require_template(tables: &Tables, id: &TemplateId) -> Result<(), CoreError> {
    if tables.templates.contains_key(id) {
        Ok(())
    } else {
        Err(integrity_error(
            "application_template_fk",
            format!("application template {} does not exist", id),
        ))
    }
}

/// Reject `instance` if it is active and another active instance holds its host
fn check_single_active_per_host(tables: &Tables, instance: &ApplicationInstance) -> Result<(), CoreError> {
    let Some(host) = instance.active_host_key() else {
        return Ok(());
    };

    let conflict = tables
        .instances
        .values()
        .any(|other| other.id != instance.id && other.active_host_key() == Some(host));

    if conflict {
        return Err(integrity_error(
            "application_instances_single_active_per_host",
            format!("public host '{}' already has a spawning or running instance", host),
        ));
    }
    Ok(())
}

/// In-memory implementation of the ApplicationTemplateRepository
pub struct InMemoryApplicationTemplateRepository {
    tables: SharedTables,
}

impl InMemoryApplicationTemplateRepository {
    /// Create a new in-memory template repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl ApplicationTemplateRepository for InMemoryApplicationTemplateRepository {
    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<ApplicationTemplate>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables.templates.get(id).cloned())
    }

    async fn find_by_host_basename(&self, host_basename: &str) -> Result<Option<ApplicationTemplate>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .templates
            .values()
            .find(|t| t.host_basename == host_basename)
            .cloned())
    }

    async fn save(&self, template: &ApplicationTemplate) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        for other in tables.templates.values().filter(|t| t.id != template.id) {
            if other.host_basename == template.host_basename {
                return Err(integrity_error(
                    "application_templates_host_basename_key",
                    format!("host basename '{}' is already used", template.host_basename),
                ));
            }
            if template.gitlab_project_id.is_some() && other.gitlab_project_id == template.gitlab_project_id {
                return Err(integrity_error(
                    "application_templates_gitlab_project_id_key",
                    format!("GitLab project {:?} is already used", template.gitlab_project_id),
                ));
            }
        }

        tables.templates.insert(template.id, template.clone());
        debug!(template_id = %template.id, "Template saved");
        Ok(())
    }

    async fn delete(&self, id: &TemplateId) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        // Instances protect their template
        if tables.instances.values().any(|i| i.application_template == *id) {
            return Err(integrity_error(
                "application_instances_application_template_fk",
                format!("application template {} is referenced by instances", id),
            ));
        }

        tables.templates.remove(id);
        tables.approvals.retain(|_, a| a.visualisation != *id);
        tables.permissions.retain(|p| p.application_template != *id);
        Ok(())
    }

    async fn list(&self, application_type: Option<ApplicationType>) -> Result<Vec<ApplicationTemplate>, CoreError> {
        let tables = self.tables.read().await;

        let mut templates: Vec<ApplicationTemplate> = tables
            .templates
            .values()
            .filter(|t| application_type.map_or(true, |ty| t.application_type == ty))
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.nice_name.cmp(&b.nice_name));

        Ok(templates)
    }
}

/// In-memory implementation of the ApplicationInstanceRepository
pub struct InMemoryApplicationInstanceRepository {
    tables: SharedTables,
}

impl InMemoryApplicationInstanceRepository {
    /// Create a new in-memory instance repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl ApplicationInstanceRepository for InMemoryApplicationInstanceRepository {
    async fn find_by_id(&self, id: &InstanceId) -> Result<Option<ApplicationInstance>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables.instances.get(id).cloned())
    }

    async fn create(&self, instance: &ApplicationInstance) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        if tables.instances.contains_key(&instance.id) {
            return Err(integrity_error(
                "application_instances_pkey",
                format!("application instance {} already exists", instance.id),
            ));
        }
        require_template(&tables, &instance.application_template)?;
        check_single_active_per_host(&tables, instance)?;

        tables.instances.insert(instance.id, instance.clone());
        debug!(instance_id = %instance.id, public_host = %instance.public_host, "Instance created");
        Ok(())
    }

    async fn save(&self, instance: &ApplicationInstance) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        let stored = tables
            .instances
            .get(&instance.id)
            .ok_or_else(|| CoreError::NotFound(format!("Application instance {}", instance.id)))?;
        let merged = stored.accept_update(instance)?;
        check_single_active_per_host(&tables, &merged)?;

        debug!(instance_id = %merged.id, state = %merged.state, "Instance saved");
        tables.instances.insert(merged.id, merged);
        Ok(())
    }

    async fn find_active_for_host(&self, public_host: &str) -> Result<Option<ApplicationInstance>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .instances
            .values()
            .find(|i| i.active_host_key() == Some(public_host))
            .cloned())
    }

    async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<ApplicationInstance>, CoreError> {
        let tables = self.tables.read().await;

        let mut instances: Vec<ApplicationInstance> = tables
            .instances
            .values()
            .filter(|i| i.owner == *owner)
            .cloned()
            .collect();
        instances.sort_by(|a, b| b.created_date.cmp(&a.created_date));

        Ok(instances)
    }

    async fn list(&self, state: Option<InstanceState>) -> Result<Vec<ApplicationInstance>, CoreError> {
        let tables = self.tables.read().await;

        let mut instances: Vec<ApplicationInstance> = tables
            .instances
            .values()
            .filter(|i| state.map_or(true, |s| i.state == s))
            .cloned()
            .collect();
        instances.sort_by(|a, b| b.created_date.cmp(&a.created_date));

        Ok(instances)
    }
}

/// In-memory implementation of the VisualisationApprovalRepository
pub struct InMemoryVisualisationApprovalRepository {
    tables: SharedTables,
}

impl InMemoryVisualisationApprovalRepository {
    /// Create a new in-memory approval repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl VisualisationApprovalRepository for InMemoryVisualisationApprovalRepository {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<VisualisationApproval>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables.approvals.get(id).cloned())
    }

    async fn save(&self, approval: &VisualisationApproval) -> Result<ApprovalSave, CoreError> {
        // Held across check, write and audit append
        let mut tables = self.tables.write().await;

        let saved = approval.prepare_save(tables.approvals.get(&approval.id))?;
        require_template(&tables, &saved.approval.visualisation)?;

        tables.approvals.insert(saved.approval.id, saved.approval.clone());
        tables.events.push(saved.event.clone());

        debug!(
            approval_id = %saved.approval.id,
            event_type = %saved.event.event_type,
            "Approval saved"
        );
        Ok(saved)
    }

    async fn list_for_visualisation(&self, visualisation: &TemplateId) -> Result<Vec<VisualisationApproval>, CoreError> {
        let tables = self.tables.read().await;

        let mut approvals: Vec<VisualisationApproval> = tables
            .approvals
            .values()
            .filter(|a| a.visualisation == *visualisation)
            .cloned()
            .collect();
        approvals.sort_by(|a, b| a.created_date.cmp(&b.created_date));

        Ok(approvals)
    }
}

/// In-memory implementation of the TemplatePermissionRepository
pub struct InMemoryTemplatePermissionRepository {
    tables: SharedTables,
}

impl InMemoryTemplatePermissionRepository {
    /// Create a new in-memory permission repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl TemplatePermissionRepository for InMemoryTemplatePermissionRepository {
    async fn grant(&self, permission: &ApplicationTemplateUserPermission) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        require_template(&tables, &permission.application_template)?;
        if !tables.permissions.insert(*permission) {
            return Err(integrity_error(
                "application_template_user_permissions_user_template_key",
                format!(
                    "user {} already holds a grant for template {}",
                    permission.user, permission.application_template
                ),
            ));
        }
        Ok(())
    }

    async fn revoke(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .permissions
            .remove(&ApplicationTemplateUserPermission::new(*user, *template)))
    }

    async fn has_permission(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .contains(&ApplicationTemplateUserPermission::new(*user, *template)))
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<TemplateId>, CoreError> {
        let tables = self.tables.read().await;

        let mut templates: Vec<TemplateId> = tables
            .permissions
            .iter()
            .filter(|p| p.user == *user)
            .map(|p| p.application_template)
            .collect();
        templates.sort();

        Ok(templates)
    }
}

/// In-memory implementation of the AuditLog
pub struct InMemoryAuditLog {
    tables: SharedTables,
}

impl InMemoryAuditLog {
    /// Create a new in-memory audit log
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn log_event(&self, entry: &EventLogEntry) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        tables.events.push(entry.clone());
        Ok(())
    }

    async fn list_for_object(&self, related: &RelatedObject) -> Result<Vec<EventLogEntry>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.related_object == *related)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the DbUserRepository
pub struct InMemoryDbUserRepository {
    tables: SharedTables,
}

impl InMemoryDbUserRepository {
    /// Create a new in-memory database user repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl DbUserRepository for InMemoryDbUserRepository {
    async fn create(&self, db_user: &ApplicationInstanceDbUser) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;

        if !tables.instances.contains_key(&db_user.application_instance) {
            return Err(integrity_error(
                "application_instance_db_users_application_instance_fk",
                format!("application instance {} does not exist", db_user.application_instance),
            ));
        }

        tables.db_users.insert(db_user.id, db_user.clone());
        Ok(())
    }

    async fn list_for_instance(&self, instance: &InstanceId) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        let tables = self.tables.read().await;

        let mut users: Vec<ApplicationInstanceDbUser> = tables
            .db_users
            .values()
            .filter(|u| u.application_instance == *instance)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_date.cmp(&b.created_date));

        Ok(users)
    }

    async fn find_by_username(&self, db_username: &str) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .db_users
            .values()
            .filter(|u| u.db_username == db_username)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the ReferenceDatasetFieldRepository
pub struct InMemoryReferenceDatasetFieldRepository {
    tables: SharedTables,
}

impl InMemoryReferenceDatasetFieldRepository {
    /// Create a new in-memory dataset field repository
    pub fn new(tables: SharedTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl ReferenceDatasetFieldRepository for InMemoryReferenceDatasetFieldRepository {
    async fn save(&self, field: &ReferenceDatasetField) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        tables.dataset_fields.insert(field.id, field.clone());
        Ok(())
    }

    async fn list_for_dataset(&self, dataset: &ReferenceDatasetId) -> Result<Vec<ReferenceDatasetField>, CoreError> {
        let tables = self.tables.read().await;

        let mut fields: Vec<ReferenceDatasetField> = tables
            .dataset_fields
            .values()
            .filter(|f| f.reference_dataset == *dataset)
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

        Ok(fields)
    }
}
