use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;

use dataworkspace_core::{
    ApplicationInstance, ApplicationInstanceDbUser, ApplicationInstanceRepository,
    ApplicationTemplate, ApplicationTemplateRepository, ApplicationTemplateUserPermission,
    ApplicationType, ApprovalId, ApprovalSave, AuditLog, CoreError, DatabaseId, DatasetFieldId,
    DatasetFieldName, DbUserId, DbUserRepository, EventId, EventLogEntry, InstanceId,
    InstanceState, ReferenceDatasetField, ReferenceDatasetFieldRepository, ReferenceDatasetId,
    RelatedObject, TemplateId, TemplatePermissionRepository, UserId, VisualisationApproval,
    VisualisationApprovalRepository,
};

use crate::PostgresConnection;

/// Translate a driver error, surfacing constraint violations as domain errors
pub(crate) fn map_db_error(context: &str, err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown");
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            warn!(constraint = %constraint, "{}: {}", context, db_err.message());
            return CoreError::IntegrityError(format!("{}: {}", constraint, db_err.message()));
        }
        if db_err.is_check_violation() {
            return CoreError::ValidationError(format!("{}: {}", constraint, db_err.message()));
        }
    }
    CoreError::StateStoreError(format!("{}: {}", context, err))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, CoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| CoreError::SerializationError(format!("Error getting {}: {}", name, e)))
}

fn enum_column<T>(row: &PgRow, name: &str) -> Result<T, CoreError>
where
    T: std::str::FromStr<Err = CoreError>,
{
    column::<String>(row, name)?.parse()
}

fn template_from_row(row: &PgRow) -> Result<ApplicationTemplate, CoreError> {
    Ok(ApplicationTemplate {
        id: TemplateId(column(row, "id")?),
        name: column(row, "name")?,
        visible: column(row, "visible")?,
        wrap: enum_column(row, "wrap")?,
        host_basename: column(row, "host_basename")?,
        nice_name: column(row, "nice_name")?,
        spawner: enum_column(row, "spawner")?,
        spawner_time: column(row, "spawner_time")?,
        spawner_options: column(row, "spawner_options")?,
        application_type: enum_column(row, "application_type")?,
        user_access_type: enum_column(row, "user_access_type")?,
        gitlab_project_id: column(row, "gitlab_project_id")?,
        created_date: column(row, "created_date")?,
        modified_date: column(row, "modified_date")?,
    })
}

fn instance_from_row(row: &PgRow) -> Result<ApplicationInstance, CoreError> {
    Ok(ApplicationInstance {
        id: InstanceId(column(row, "id")?),
        owner: UserId(column(row, "owner_id")?),
        public_host: column(row, "public_host")?,
        application_template: TemplateId(column(row, "application_template_id")?),
        spawner: enum_column(row, "spawner")?,
        spawner_application_template_options: column(row, "spawner_application_template_options")?,
        spawner_application_instance_id: column(row, "spawner_application_instance_id")?,
        spawner_created_at: column(row, "spawner_created_at")?,
        spawner_stopped_at: column(row, "spawner_stopped_at")?,
        spawner_cpu: column(row, "spawner_cpu")?,
        spawner_memory: column(row, "spawner_memory")?,
        state: enum_column(row, "state")?,
        proxy_url: column(row, "proxy_url")?,
        cpu: column(row, "cpu")?,
        memory: column(row, "memory")?,
        commit_id: column(row, "commit_id")?,
        created_date: column(row, "created_date")?,
        modified_date: column(row, "modified_date")?,
    })
}

fn approval_from_row(row: &PgRow) -> Result<VisualisationApproval, CoreError> {
    Ok(VisualisationApproval {
        id: ApprovalId(column(row, "id")?),
        approved: column(row, "approved")?,
        approver: UserId(column(row, "approver_id")?),
        visualisation: TemplateId(column(row, "visualisation_id")?),
        created_date: column(row, "created_date")?,
        modified_date: column(row, "modified_date")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventLogEntry, CoreError> {
    let object_type: String = column(row, "related_object_type")?;
    let object_id: Uuid = column(row, "related_object_id")?;

    Ok(EventLogEntry {
        id: EventId(column(row, "id")?),
        user: UserId(column(row, "user_id")?),
        event_type: enum_column(row, "event_type")?,
        related_object: RelatedObject::from_parts(&object_type, object_id)?,
        extra: column(row, "extra")?,
        timestamp: column(row, "timestamp")?,
    })
}

fn db_user_from_row(row: &PgRow) -> Result<ApplicationInstanceDbUser, CoreError> {
    Ok(ApplicationInstanceDbUser {
        id: DbUserId(column(row, "id")?),
        db: DatabaseId(column(row, "db_id")?),
        db_username: column(row, "db_username")?,
        application_instance: InstanceId(column(row, "application_instance_id")?),
        created_date: column(row, "created_date")?,
    })
}

fn dataset_field_from_row(row: &PgRow) -> Result<ReferenceDatasetField, CoreError> {
    Ok(ReferenceDatasetField {
        id: DatasetFieldId(column(row, "id")?),
        reference_dataset: ReferenceDatasetId(column(row, "reference_dataset_id")?),
        name: DatasetFieldName::parse(column::<String>(row, "name")?)?,
        description: column(row, "description")?,
    })
}

async fn insert_event<'e, E>(executor: E, entry: &EventLogEntry) -> Result<(), CoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO event_log (id, user_id, event_type, related_object_type, related_object_id, extra, timestamp)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id.0)
    .bind(entry.user.0)
    .bind(entry.event_type.as_str())
    .bind(entry.related_object.object_type())
    .bind(entry.related_object.object_id())
    .bind(&entry.extra)
    .bind(entry.timestamp)
    .execute(executor)
    .await
    .map_err(|e| map_db_error("Failed to record event", e))?;

    Ok(())
}

/// Postgres implementation of the ApplicationTemplateRepository
#[derive(Clone)]
pub struct PostgresApplicationTemplateRepository {
    conn: PostgresConnection,
}

impl PostgresApplicationTemplateRepository {
    /// Create a new Postgres template repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ApplicationTemplateRepository for PostgresApplicationTemplateRepository {
    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<ApplicationTemplate>, CoreError> {
        let row = sqlx::query("SELECT * FROM application_templates WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to load template", e))?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn find_by_host_basename(&self, host_basename: &str) -> Result<Option<ApplicationTemplate>, CoreError> {
        let row = sqlx::query("SELECT * FROM application_templates WHERE host_basename = $1")
            .bind(host_basename)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to load template", e))?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn save(&self, template: &ApplicationTemplate) -> Result<(), CoreError> {
        let query = "
            INSERT INTO application_templates (
                id, name, visible, wrap, host_basename, nice_name, spawner, spawner_time,
                spawner_options, application_type, user_access_type, gitlab_project_id,
                created_date, modified_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                name = $2,
                visible = $3,
                wrap = $4,
                host_basename = $5,
                nice_name = $6,
                spawner = $7,
                spawner_time = $8,
                spawner_options = $9,
                application_type = $10,
                user_access_type = $11,
                gitlab_project_id = $12,
                modified_date = $14
        ";

        sqlx::query(query)
            .bind(template.id.0)
            .bind(&template.name)
            .bind(template.visible)
            .bind(template.wrap.as_str())
            .bind(&template.host_basename)
            .bind(&template.nice_name)
            .bind(template.spawner.as_str())
            .bind(template.spawner_time)
            .bind(&template.spawner_options)
            .bind(template.application_type.as_str())
            .bind(template.user_access_type.as_str())
            .bind(template.gitlab_project_id)
            .bind(template.created_date)
            .bind(template.modified_date)
            .execute(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to save template", e))?;

        debug!(template_id = %template.id, "Template saved");
        Ok(())
    }

    async fn delete(&self, id: &TemplateId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM application_templates WHERE id = $1")
            .bind(id.0)
            .execute(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to delete template", e))?;

        Ok(())
    }

    async fn list(&self, application_type: Option<ApplicationType>) -> Result<Vec<ApplicationTemplate>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM application_templates
             WHERE $1::TEXT IS NULL OR application_type = $1
             ORDER BY nice_name",
        )
        .bind(application_type.map(|t| t.as_str()))
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to list templates", e))?;

        rows.iter().map(template_from_row).collect()
    }
}

/// Postgres implementation of the ApplicationInstanceRepository
#[derive(Clone)]
pub struct PostgresApplicationInstanceRepository {
    conn: PostgresConnection,
}

impl PostgresApplicationInstanceRepository {
    /// Create a new Postgres instance repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ApplicationInstanceRepository for PostgresApplicationInstanceRepository {
    async fn find_by_id(&self, id: &InstanceId) -> Result<Option<ApplicationInstance>, CoreError> {
        let row = sqlx::query("SELECT * FROM application_instances WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to load instance", e))?;

        row.as_ref().map(instance_from_row).transpose()
    }

    async fn create(&self, instance: &ApplicationInstance) -> Result<(), CoreError> {
        let query = "
            INSERT INTO application_instances (
                id, owner_id, public_host, application_template_id, spawner,
                spawner_application_template_options, spawner_application_instance_id,
                spawner_created_at, spawner_stopped_at, spawner_cpu, spawner_memory, state,
                proxy_url, cpu, memory, commit_id, created_date, modified_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ";

        sqlx::query(query)
            .bind(instance.id.0)
            .bind(instance.owner.0)
            .bind(&instance.public_host)
            .bind(instance.application_template.0)
            .bind(instance.spawner.as_str())
            .bind(&instance.spawner_application_template_options)
            .bind(&instance.spawner_application_instance_id)
            .bind(instance.spawner_created_at)
            .bind(instance.spawner_stopped_at)
            .bind(&instance.spawner_cpu)
            .bind(&instance.spawner_memory)
            .bind(instance.state.as_str())
            .bind(&instance.proxy_url)
            .bind(&instance.cpu)
            .bind(&instance.memory)
            .bind(&instance.commit_id)
            .bind(instance.created_date)
            .bind(instance.modified_date)
            .execute(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to create instance", e))?;

        debug!(instance_id = %instance.id, public_host = %instance.public_host, "Instance created");
        Ok(())
    }

    async fn save(&self, instance: &ApplicationInstance) -> Result<(), CoreError> {
        let mut tx = self
            .conn
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        let stored = sqlx::query("SELECT * FROM application_instances WHERE id = $1 FOR UPDATE")
            .bind(instance.id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to load instance", e))?
            .ok_or_else(|| CoreError::NotFound(format!("Application instance {}", instance.id)))?;
        let merged = instance_from_row(&stored)?.accept_update(instance)?;

        let query = "
            UPDATE application_instances SET
                spawner_application_instance_id = $2,
                spawner_created_at = $3,
                spawner_stopped_at = $4,
                spawner_cpu = $5,
                spawner_memory = $6,
                state = $7,
                proxy_url = $8,
                modified_date = $9
            WHERE id = $1
        ";

        sqlx::query(query)
            .bind(merged.id.0)
            .bind(&merged.spawner_application_instance_id)
            .bind(merged.spawner_created_at)
            .bind(merged.spawner_stopped_at)
            .bind(&merged.spawner_cpu)
            .bind(&merged.spawner_memory)
            .bind(merged.state.as_str())
            .bind(&merged.proxy_url)
            .bind(merged.modified_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to save instance", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit instance", e))?;

        debug!(instance_id = %merged.id, state = %merged.state, "Instance saved");
        Ok(())
    }

    async fn find_active_for_host(&self, public_host: &str) -> Result<Option<ApplicationInstance>, CoreError> {
        let active: Vec<String> = InstanceState::ACTIVE.iter().map(|s| s.to_string()).collect();

        let row = sqlx::query("SELECT * FROM application_instances WHERE public_host = $1 AND state = ANY($2)")
            .bind(public_host)
            .bind(active)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to load instance", e))?;

        row.as_ref().map(instance_from_row).transpose()
    }

    async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<ApplicationInstance>, CoreError> {
        let rows = sqlx::query("SELECT * FROM application_instances WHERE owner_id = $1 ORDER BY created_date DESC")
            .bind(owner.0)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to list instances", e))?;

        rows.iter().map(instance_from_row).collect()
    }

    async fn list(&self, state: Option<InstanceState>) -> Result<Vec<ApplicationInstance>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM application_instances
             WHERE $1::TEXT IS NULL OR state = $1
             ORDER BY created_date DESC",
        )
        .bind(state.map(|s| s.as_str()))
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to list instances", e))?;

        rows.iter().map(instance_from_row).collect()
    }
}

/// Postgres implementation of the VisualisationApprovalRepository
#[derive(Clone)]
pub struct PostgresVisualisationApprovalRepository {
    conn: PostgresConnection,
}

impl PostgresVisualisationApprovalRepository {
    /// Create a new Postgres approval repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl VisualisationApprovalRepository for PostgresVisualisationApprovalRepository {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<VisualisationApproval>, CoreError> {
        let row = sqlx::query("SELECT * FROM visualisation_approvals WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to load approval", e))?;

        row.as_ref().map(approval_from_row).transpose()
    }

    async fn save(&self, approval: &VisualisationApproval) -> Result<ApprovalSave, CoreError> {
        let mut tx = self
            .conn
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        // Lock the stored row so concurrent saves see each other's decision
        let stored = sqlx::query("SELECT * FROM visualisation_approvals WHERE id = $1 FOR UPDATE")
            .bind(approval.id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to load approval", e))?
            .as_ref()
            .map(approval_from_row)
            .transpose()?;

        // Dropping the transaction on error rolls it back
        let saved = approval.prepare_save(stored.as_ref())?;
        let record = &saved.approval;

        if stored.is_some() {
            sqlx::query("UPDATE visualisation_approvals SET approved = $2, approver_id = $3, modified_date = $4 WHERE id = $1")
                .bind(record.id.0)
                .bind(record.approved)
                .bind(record.approver.0)
                .bind(record.modified_date)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_error("Failed to save approval", e))?;
        } else {
            sqlx::query(
                "INSERT INTO visualisation_approvals (id, approved, approver_id, visualisation_id, created_date, modified_date)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(record.id.0)
            .bind(record.approved)
            .bind(record.approver.0)
            .bind(record.visualisation.0)
            .bind(record.created_date)
            .bind(record.modified_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to save approval", e))?;
        }

        insert_event(&mut *tx, &saved.event).await?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit approval", e))?;

        debug!(
            approval_id = %record.id,
            event_type = %saved.event.event_type,
            "Approval saved"
        );
        Ok(saved)
    }

    async fn list_for_visualisation(&self, visualisation: &TemplateId) -> Result<Vec<VisualisationApproval>, CoreError> {
        let rows = sqlx::query("SELECT * FROM visualisation_approvals WHERE visualisation_id = $1 ORDER BY created_date")
            .bind(visualisation.0)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to list approvals", e))?;

        rows.iter().map(approval_from_row).collect()
    }
}

/// Postgres implementation of the TemplatePermissionRepository
#[derive(Clone)]
pub struct PostgresTemplatePermissionRepository {
    conn: PostgresConnection,
}

impl PostgresTemplatePermissionRepository {
    /// Create a new Postgres permission repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TemplatePermissionRepository for PostgresTemplatePermissionRepository {
    async fn grant(&self, permission: &ApplicationTemplateUserPermission) -> Result<(), CoreError> {
        sqlx::query("INSERT INTO application_template_user_permissions (user_id, application_template_id) VALUES ($1, $2)")
            .bind(permission.user.0)
            .bind(permission.application_template.0)
            .execute(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to grant access", e))?;

        Ok(())
    }

    async fn revoke(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "DELETE FROM application_template_user_permissions WHERE user_id = $1 AND application_template_id = $2",
        )
        .bind(user.0)
        .bind(template.0)
        .execute(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to revoke access", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_permission(&self, user: &UserId, template: &TemplateId) -> Result<bool, CoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM application_template_user_permissions
                WHERE user_id = $1 AND application_template_id = $2
            )",
        )
        .bind(user.0)
        .bind(template.0)
        .fetch_one(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to check access", e))
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<TemplateId>, CoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT application_template_id FROM application_template_user_permissions
             WHERE user_id = $1 ORDER BY application_template_id",
        )
        .bind(user.0)
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to list grants", e))?;

        Ok(ids.into_iter().map(TemplateId).collect())
    }
}

/// Postgres implementation of the AuditLog
#[derive(Clone)]
pub struct PostgresAuditLog {
    conn: PostgresConnection,
}

impl PostgresAuditLog {
    /// Create a new Postgres audit log
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn log_event(&self, entry: &EventLogEntry) -> Result<(), CoreError> {
        insert_event(self.conn.pool(), entry).await
    }

    async fn list_for_object(&self, related: &RelatedObject) -> Result<Vec<EventLogEntry>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_log
             WHERE related_object_type = $1 AND related_object_id = $2
             ORDER BY timestamp",
        )
        .bind(related.object_type())
        .bind(related.object_id())
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to list events", e))?;

        rows.iter().map(event_from_row).collect()
    }
}

/// Postgres implementation of the DbUserRepository
#[derive(Clone)]
pub struct PostgresDbUserRepository {
    conn: PostgresConnection,
}

impl PostgresDbUserRepository {
    /// Create a new Postgres database user repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DbUserRepository for PostgresDbUserRepository {
    async fn create(&self, db_user: &ApplicationInstanceDbUser) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO application_instance_db_users (id, db_id, db_username, application_instance_id, created_date)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(db_user.id.0)
        .bind(db_user.db.0)
        .bind(&db_user.db_username)
        .bind(db_user.application_instance.0)
        .bind(db_user.created_date)
        .execute(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to record database user", e))?;

        Ok(())
    }

    async fn list_for_instance(&self, instance: &InstanceId) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM application_instance_db_users WHERE application_instance_id = $1 ORDER BY created_date",
        )
        .bind(instance.0)
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to list database users", e))?;

        rows.iter().map(db_user_from_row).collect()
    }

    async fn find_by_username(&self, db_username: &str) -> Result<Vec<ApplicationInstanceDbUser>, CoreError> {
        let rows = sqlx::query("SELECT * FROM application_instance_db_users WHERE db_username = $1")
            .bind(db_username)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to list database users", e))?;

        rows.iter().map(db_user_from_row).collect()
    }
}

/// Postgres implementation of the ReferenceDatasetFieldRepository
#[derive(Clone)]
pub struct PostgresReferenceDatasetFieldRepository {
    conn: PostgresConnection,
}

impl PostgresReferenceDatasetFieldRepository {
    /// Create a new Postgres dataset field repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ReferenceDatasetFieldRepository for PostgresReferenceDatasetFieldRepository {
    async fn save(&self, field: &ReferenceDatasetField) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO reference_dataset_fields (id, reference_dataset_id, name, description)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET name = $3, description = $4",
        )
        .bind(field.id.0)
        .bind(field.reference_dataset.0)
        .bind(field.name.as_str())
        .bind(&field.description)
        .execute(self.conn.pool())
        .await
        .map_err(|e| map_db_error("Failed to save dataset field", e))?;

        Ok(())
    }

    async fn list_for_dataset(&self, dataset: &ReferenceDatasetId) -> Result<Vec<ReferenceDatasetField>, CoreError> {
        let rows = sqlx::query("SELECT * FROM reference_dataset_fields WHERE reference_dataset_id = $1 ORDER BY name")
            .bind(dataset.0)
            .fetch_all(self.conn.pool())
            .await
            .map_err(|e| map_db_error("Failed to list dataset fields", e))?;

        rows.iter().map(dataset_field_from_row).collect()
    }
}
