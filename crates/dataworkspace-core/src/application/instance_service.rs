use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    domain::application_instance::{ApplicationInstance, LaunchRequest, SpawnerReport},
    domain::db_user::ApplicationInstanceDbUser,
    domain::event_log::{EventLogEntry, EventType, RelatedObject},
    domain::identifiers::{DatabaseId, InstanceId, TemplateId, UserId},
    domain::repository::{
        ApplicationInstanceRepository, ApplicationTemplateRepository, AuditLog, DbUserRepository,
        TemplatePermissionRepository,
    },
    CoreError,
};

/// Service driving application instances through their lifecycle as the
/// spawner reports progress
pub struct InstanceLifecycleService {
    templates: Arc<dyn ApplicationTemplateRepository>,
    instances: Arc<dyn ApplicationInstanceRepository>,
    permissions: Arc<dyn TemplatePermissionRepository>,
    db_users: Arc<dyn DbUserRepository>,
    audit_log: Arc<dyn AuditLog>,
}

impl InstanceLifecycleService {
    /// Create a new instance lifecycle service
    pub fn new(
        templates: Arc<dyn ApplicationTemplateRepository>,
        instances: Arc<dyn ApplicationInstanceRepository>,
        permissions: Arc<dyn TemplatePermissionRepository>,
        db_users: Arc<dyn DbUserRepository>,
        audit_log: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            templates,
            instances,
            permissions,
            db_users,
            audit_log,
        }
    }

    /// Request a new instance of a template.
    ///
    /// The store rejects the launch with [`CoreError::IntegrityError`] while
    /// another instance is spawning or running on the same public host. Once
    /// the store accepts it the instance is returned, even if the audit entry
    /// cannot be written.
    pub async fn launch(
        &self,
        template_id: &TemplateId,
        owner: UserId,
        public_host: &str,
        request: LaunchRequest,
    ) -> Result<ApplicationInstance, CoreError> {
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Application template {}", template_id)))?;

        let granted = if template.requires_authorization() {
            self.permissions.has_permission(&owner, &template.id).await?
        } else {
            false
        };
        if !template.user_has_access(granted) {
            tracing::warn!(template_id = %template.id, owner = %owner, "Launch refused: no access");
            return Err(CoreError::AccessDenied(format!(
                "User {} may not launch {}",
                owner, template.host_basename
            )));
        }

        let instance = ApplicationInstance::spawn(&template, owner, public_host, request)?;
        if let Err(e) = self.instances.create(&instance).await {
            tracing::warn!(public_host = %public_host, error = %e, "Launch rejected by store");
            return Err(e);
        }

        let entry = EventLogEntry::new(
            owner,
            EventType::ApplicationInstanceLaunched,
            RelatedObject::ApplicationInstance(instance.id),
        )
        .with_extra(serde_json::json!({ "public_host": instance.public_host }));
        self.record_event(&entry).await;

        tracing::info!(
            instance_id = %instance.id,
            template_id = %template.id,
            public_host = %instance.public_host,
            "Application instance spawning"
        );

        Ok(instance)
    }

    /// Append to the audit log after a committed state change. A failure is
    /// logged and does not undo the change.
    async fn record_event(&self, entry: &EventLogEntry) {
        if let Err(e) = self.audit_log.log_event(entry).await {
            tracing::error!(
                event_type = %entry.event_type,
                related_object = ?entry.related_object,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }

    async fn load(&self, id: &InstanceId) -> Result<ApplicationInstance, CoreError> {
        self.instances
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Application instance {}", id)))
    }

    /// The spawner reports the application reachable at `proxy_url`
    pub async fn report_running(
        &self,
        id: &InstanceId,
        spawner_application_instance_id: &str,
        proxy_url: &str,
    ) -> Result<ApplicationInstance, CoreError> {
        let mut instance = self.load(id).await?;
        instance.mark_running(spawner_application_instance_id, proxy_url)?;
        self.instances.save(&instance).await?;

        tracing::info!(instance_id = %instance.id, proxy_url = %instance.proxy_url, "Application instance running");
        Ok(instance)
    }

    /// The spawner reports the application stopped. Frees the public host.
    ///
    /// Like [`launch`](Self::launch), the stopped instance is returned even if
    /// the audit entry cannot be written.
    pub async fn report_stopped(
        &self,
        id: &InstanceId,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<ApplicationInstance, CoreError> {
        let mut instance = self.load(id).await?;
        instance.mark_stopped(stopped_at)?;
        self.instances.save(&instance).await?;

        let entry = EventLogEntry::new(
            instance.owner,
            EventType::ApplicationInstanceStopped,
            RelatedObject::ApplicationInstance(instance.id),
        );
        self.record_event(&entry).await;

        tracing::info!(instance_id = %instance.id, public_host = %instance.public_host, "Application instance stopped");
        Ok(instance)
    }

    /// Record spawner-reported timestamps and resource usage
    pub async fn record_usage(&self, id: &InstanceId, report: SpawnerReport) -> Result<ApplicationInstance, CoreError> {
        let mut instance = self.load(id).await?;
        instance.apply_spawner_report(report)?;
        self.instances.save(&instance).await?;

        tracing::debug!(
            instance_id = %instance.id,
            cpu = ?instance.spawner_cpu,
            memory = ?instance.spawner_memory,
            "Spawner usage recorded"
        );
        Ok(instance)
    }

    /// The instance currently spawning or running on `public_host`
    pub async fn active_instance_for_host(&self, public_host: &str) -> Result<Option<ApplicationInstance>, CoreError> {
        self.instances.find_active_for_host(public_host).await
    }

    /// Instances launched by `owner`
    pub async fn instances_for_owner(&self, owner: &UserId) -> Result<Vec<ApplicationInstance>, CoreError> {
        self.instances.list_for_owner(owner).await
    }

    /// Record a database user created for an instance
    pub async fn register_db_user(
        &self,
        id: &InstanceId,
        db: DatabaseId,
        db_username: &str,
    ) -> Result<ApplicationInstanceDbUser, CoreError> {
        let instance = self.load(id).await?;
        let db_user = ApplicationInstanceDbUser::new(instance.id, db, db_username)?;
        self.db_users.create(&db_user).await?;

        tracing::info!(instance_id = %instance.id, db = %db, db_username = %db_username, "Database user registered");
        Ok(db_user)
    }

    /// Database users of an instance
    pub async fn db_users_for_instance(&self, id: &InstanceId) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        self.db_users.list_for_instance(id).await
    }

    /// Database users with a username, across all databases
    pub async fn db_users_by_username(&self, db_username: &str) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        self.db_users.find_by_username(db_username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application_instance::InstanceState;
    use crate::domain::application_template::{ApplicationTemplate, UserAccessType};
    use crate::domain::repository::{
        MockApplicationInstanceRepository, MockApplicationTemplateRepository, MockAuditLog,
        MockDbUserRepository, MockTemplatePermissionRepository,
    };

    struct Mocks {
        templates: MockApplicationTemplateRepository,
        instances: MockApplicationInstanceRepository,
        permissions: MockTemplatePermissionRepository,
        db_users: MockDbUserRepository,
        audit_log: MockAuditLog,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                templates: MockApplicationTemplateRepository::new(),
                instances: MockApplicationInstanceRepository::new(),
                permissions: MockTemplatePermissionRepository::new(),
                db_users: MockDbUserRepository::new(),
                audit_log: MockAuditLog::new(),
            }
        }

        fn with_template(mut self, template: ApplicationTemplate) -> Self {
            self.templates
                .expect_find_by_id()
                .returning(move |_| Ok(Some(template.clone())));
            self
        }

        fn build(self) -> InstanceLifecycleService {
            InstanceLifecycleService::new(
                Arc::new(self.templates),
                Arc::new(self.instances),
                Arc::new(self.permissions),
                Arc::new(self.db_users),
                Arc::new(self.audit_log),
            )
        }
    }

    fn tool() -> ApplicationTemplate {
        ApplicationTemplate::tool("jupyterlab", "JupyterLab", "jupyterlab", r#"{"CPU":"1024"}"#)
    }

    #[tokio::test]
    async fn test_launch_creates_spawning_instance_and_logs() {
        let mut mocks = Mocks::new().with_template(tool());
        mocks
            .instances
            .expect_create()
            .withf(|i| i.state == InstanceState::Spawning && i.public_host == "jupyterlab-1")
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .audit_log
            .expect_log_event()
            .withf(|e| e.event_type == EventType::ApplicationInstanceLaunched)
            .times(1)
            .returning(|_| Ok(()));

        let service = mocks.build();
        let instance = service
            .launch(&TemplateId::new_v4(), UserId(1), "jupyterlab-1", LaunchRequest::default())
            .await
            .unwrap();

        assert_eq!(instance.spawner_application_template_options, r#"{"CPU":"1024"}"#);
    }

    #[tokio::test]
    async fn test_launch_surfaces_integrity_error_without_logging() {
        let mut mocks = Mocks::new().with_template(tool());
        mocks
            .instances
            .expect_create()
            .returning(|_| Err(CoreError::IntegrityError("public host in use".to_string())));
        mocks.audit_log.expect_log_event().never();

        let service = mocks.build();
        let result = service
            .launch(&TemplateId::new_v4(), UserId(1), "jupyterlab-1", LaunchRequest::default())
            .await;

        assert!(matches!(result, Err(CoreError::IntegrityError(_))));
    }

    #[tokio::test]
    async fn test_launch_returns_instance_when_audit_write_fails() {
        let mut mocks = Mocks::new().with_template(tool());
        mocks.instances.expect_create().times(1).returning(|_| Ok(()));
        mocks
            .audit_log
            .expect_log_event()
            .times(1)
            .returning(|_| Err(CoreError::StateStoreError("event_log unavailable".to_string())));

        let service = mocks.build();
        let instance = service
            .launch(&TemplateId::new_v4(), UserId(1), "jupyterlab-1", LaunchRequest::default())
            .await
            .unwrap();

        assert_eq!(instance.state, InstanceState::Spawning);
    }

    #[tokio::test]
    async fn test_report_stopped_returns_instance_when_audit_write_fails() {
        let instance =
            ApplicationInstance::spawn(&tool(), UserId(1), "jupyterlab-1", LaunchRequest::default()).unwrap();

        let mut mocks = Mocks::new();
        mocks
            .instances
            .expect_find_by_id()
            .returning(move |_| Ok(Some(instance.clone())));
        mocks
            .instances
            .expect_save()
            .withf(|i| i.state == InstanceState::Stopped)
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .audit_log
            .expect_log_event()
            .returning(|_| Err(CoreError::StateStoreError("event_log unavailable".to_string())));

        let service = mocks.build();
        let stopped = service.report_stopped(&InstanceId::new_v4(), None).await.unwrap();

        assert_eq!(stopped.state, InstanceState::Stopped);
    }

    #[tokio::test]
    async fn test_launch_requires_grant_for_authorized_templates() {
        let template = tool().with_user_access_type(UserAccessType::RequiresAuthorization);
        let mut mocks = Mocks::new().with_template(template);
        mocks.permissions.expect_has_permission().returning(|_, _| Ok(false));
        mocks.instances.expect_create().never();

        let service = mocks.build();
        let result = service
            .launch(&TemplateId::new_v4(), UserId(1), "jupyterlab-1", LaunchRequest::default())
            .await;

        assert!(matches!(result, Err(CoreError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_launch_unknown_template() {
        let mut mocks = Mocks::new();
        mocks.templates.expect_find_by_id().returning(|_| Ok(None));

        let service = mocks.build();
        let result = service
            .launch(&TemplateId::new_v4(), UserId(1), "x", LaunchRequest::default())
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_report_stopped_on_stopped_instance_is_rejected() {
        let mut instance =
            ApplicationInstance::spawn(&tool(), UserId(1), "jupyterlab-1", LaunchRequest::default()).unwrap();
        instance.mark_stopped(None).unwrap();

        let mut mocks = Mocks::new();
        mocks
            .instances
            .expect_find_by_id()
            .returning(move |_| Ok(Some(instance.clone())));
        mocks.instances.expect_save().never();

        let service = mocks.build();
        let result = service.report_stopped(&InstanceId::new_v4(), None).await;

        assert!(matches!(result, Err(CoreError::InvalidStateTransition(_))));
    }
}
