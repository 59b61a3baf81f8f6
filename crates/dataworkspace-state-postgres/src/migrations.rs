/// Bookkeeping table recording applied migrations
pub const MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dataworkspace_migrations (
    name TEXT PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Generate SQL migrations for PostgreSQL state store
///
/// These migrations create the tables, constraints and indexes for the
/// Data Workspace state store in PostgreSQL, in application order.
pub fn generate_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        // Templates and the instances launched from them
        (
            "20240401000000_applications",
            r#"
            CREATE TABLE IF NOT EXISTS application_templates (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL CHECK (name ~ '^[a-z]+$' AND char_length(name) <= 128),
                visible BOOLEAN NOT NULL DEFAULT TRUE,
                wrap TEXT NOT NULL CHECK (wrap IN ('NONE', 'FULL_HEIGHT_IFRAME')),
                host_basename TEXT NOT NULL CHECK (char_length(host_basename) <= 128),
                nice_name TEXT NOT NULL CHECK (char_length(nice_name) <= 128),
                spawner TEXT NOT NULL CHECK (spawner IN ('PROCESS', 'FARGATE')),
                spawner_time INTEGER NOT NULL DEFAULT 0,
                spawner_options TEXT NOT NULL CHECK (char_length(spawner_options) <= 10240),
                application_type TEXT NOT NULL CHECK (application_type IN ('TOOL', 'VISUALISATION')),
                user_access_type TEXT NOT NULL,
                gitlab_project_id BIGINT,
                created_date TIMESTAMPTZ NOT NULL,
                modified_date TIMESTAMPTZ NOT NULL,
                CONSTRAINT application_templates_host_basename_key UNIQUE (host_basename),
                CONSTRAINT application_templates_gitlab_project_id_key UNIQUE (gitlab_project_id)
            );

            CREATE TABLE IF NOT EXISTS application_instances (
                id UUID PRIMARY KEY,
                owner_id BIGINT NOT NULL,
                public_host TEXT NOT NULL CHECK (char_length(public_host) <= 63),
                application_template_id UUID NOT NULL,
                spawner TEXT NOT NULL,
                spawner_application_template_options TEXT NOT NULL,
                spawner_application_instance_id TEXT NOT NULL,
                spawner_created_at TIMESTAMPTZ,
                spawner_stopped_at TIMESTAMPTZ,
                spawner_cpu TEXT,
                spawner_memory TEXT,
                state TEXT NOT NULL CHECK (state IN ('SPAWNING', 'RUNNING', 'STOPPED')),
                proxy_url TEXT NOT NULL,
                cpu TEXT,
                memory TEXT,
                commit_id TEXT,
                created_date TIMESTAMPTZ NOT NULL,
                modified_date TIMESTAMPTZ NOT NULL,
                CONSTRAINT application_instances_application_template_fk
                    FOREIGN KEY (application_template_id) REFERENCES application_templates(id) ON DELETE RESTRICT
            );

            -- At most one spawning or running instance per public host
            CREATE UNIQUE INDEX IF NOT EXISTS application_instances_single_active_per_host
                ON application_instances(public_host)
                WHERE state IN ('SPAWNING', 'RUNNING');

            CREATE INDEX IF NOT EXISTS idx_application_instances_owner ON application_instances(owner_id, created_date);
            CREATE INDEX IF NOT EXISTS idx_application_instances_state ON application_instances(state);

            CREATE TABLE IF NOT EXISTS application_instance_db_users (
                id UUID PRIMARY KEY,
                db_id BIGINT NOT NULL,
                db_username TEXT NOT NULL CHECK (char_length(db_username) <= 256),
                application_instance_id UUID NOT NULL,
                created_date TIMESTAMPTZ NOT NULL,
                CONSTRAINT application_instance_db_users_application_instance_fk
                    FOREIGN KEY (application_instance_id) REFERENCES application_instances(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_application_instance_db_users_username
                ON application_instance_db_users(db_username);
            "#,
        ),
        // Approvals, grants and the audit log
        (
            "20240402000000_approvals_and_permissions",
            r#"
            CREATE TABLE IF NOT EXISTS visualisation_approvals (
                id UUID PRIMARY KEY,
                approved BOOLEAN NOT NULL,
                approver_id BIGINT NOT NULL,
                visualisation_id UUID NOT NULL,
                created_date TIMESTAMPTZ NOT NULL,
                modified_date TIMESTAMPTZ,
                CONSTRAINT visualisation_approvals_visualisation_fk
                    FOREIGN KEY (visualisation_id) REFERENCES application_templates(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_visualisation_approvals_visualisation
                ON visualisation_approvals(visualisation_id, created_date);

            CREATE TABLE IF NOT EXISTS application_template_user_permissions (
                user_id BIGINT NOT NULL,
                application_template_id UUID NOT NULL,
                CONSTRAINT application_template_user_permissions_user_template_key
                    UNIQUE (user_id, application_template_id),
                CONSTRAINT application_template_user_permissions_template_fk
                    FOREIGN KEY (application_template_id) REFERENCES application_templates(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS event_log (
                id UUID PRIMARY KEY,
                user_id BIGINT NOT NULL,
                event_type TEXT NOT NULL,
                related_object_type TEXT NOT NULL,
                related_object_id UUID NOT NULL,
                extra JSONB NOT NULL DEFAULT 'null',
                timestamp TIMESTAMPTZ NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_event_log_related_object
                ON event_log(related_object_type, related_object_id, timestamp);
            "#,
        ),
        // Reference dataset columns
        (
            "20240403000000_reference_dataset_fields",
            r#"
            CREATE TABLE IF NOT EXISTS reference_dataset_fields (
                id UUID PRIMARY KEY,
                reference_dataset_id UUID NOT NULL,
                name TEXT NOT NULL CHECK (name ~ '^[a-z][a-z0-9_.]*$' AND char_length(name) <= 60),
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_reference_dataset_fields_dataset
                ON reference_dataset_fields(reference_dataset_id, name);
            "#,
        ),
    ]
}
