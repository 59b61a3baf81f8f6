//! End-to-end flows through the workspace services over the in-memory store

use dataworkspace::dataworkspace_core::{
    ApplicationTemplate, ApprovalTransitionError, CoreError, DatabaseId, EventType, InstanceState,
    LaunchRequest, RelatedObject, SiteSettings, SpawnerReport, UserAccessType, UserId, WorkspaceConfig,
};
use dataworkspace::Workspace;
use pretty_assertions::assert_eq;

fn workspace() -> Workspace {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = WorkspaceConfig {
        site: SiteSettings {
            application_root_domain: "dataworkspace.test:8000".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    Workspace::in_memory(config)
}

#[tokio::test]
async fn test_tool_lifecycle_frees_host_on_stop() -> anyhow::Result<()> {
    let workspace = workspace();
    let tool = workspace
        .templates()
        .register_tool(ApplicationTemplate::tool("jupyterlab", "JupyterLab", "jupyterlab", "{}"))
        .await?;
    let instances = workspace.instances();

    let first = instances
        .launch(&tool.id, UserId(1), "jupyterlab-1", LaunchRequest::default())
        .await?;
    assert_eq!(first.state, InstanceState::Spawning);

    let clash = instances
        .launch(&tool.id, UserId(1), "jupyterlab-1", LaunchRequest::default())
        .await;
    assert!(matches!(clash, Err(CoreError::IntegrityError(_))));

    instances
        .report_running(&first.id, "arn:task/1", "http://10.0.0.1:8888")
        .await?;
    let usage = instances
        .record_usage(
            &first.id,
            SpawnerReport {
                cpu: Some("1024".to_string()),
                memory: Some("8192".to_string()),
                created_at: Some(chrono::Utc::now()),
                stopped_at: None,
            },
        )
        .await?;
    assert_eq!(usage.spawner_cpu.as_deref(), Some("1024"));

    // Still running, so the host stays taken
    let clash = instances
        .launch(&tool.id, UserId(2), "jupyterlab-1", LaunchRequest::default())
        .await;
    assert!(matches!(clash, Err(CoreError::IntegrityError(_))));

    instances.report_stopped(&first.id, Some(chrono::Utc::now())).await?;
    assert!(instances.active_instance_for_host("jupyterlab-1").await?.is_none());

    let second = instances
        .launch(&tool.id, UserId(2), "jupyterlab-1", LaunchRequest::default())
        .await?;
    let active = instances.active_instance_for_host("jupyterlab-1").await?;
    assert_eq!(active.map(|i| i.id), Some(second.id));

    let events: Vec<EventType> = workspace
        .repositories()
        .audit_log
        .list_for_object(&RelatedObject::ApplicationInstance(first.id))
        .await?
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        events,
        vec![EventType::ApplicationInstanceLaunched, EventType::ApplicationInstanceStopped]
    );

    Ok(())
}

#[tokio::test]
async fn test_stopped_instance_cannot_restart() -> anyhow::Result<()> {
    let workspace = workspace();
    let tool = workspace
        .templates()
        .register_tool(ApplicationTemplate::tool("rstudio", "RStudio", "rstudio", "{}"))
        .await?;
    let instances = workspace.instances();

    let instance = instances
        .launch(&tool.id, UserId(1), "rstudio-1", LaunchRequest::default())
        .await?;
    instances.report_stopped(&instance.id, None).await?;

    let result = instances.report_running(&instance.id, "arn:task/2", "http://10.0.0.2:8888").await;
    assert!(matches!(result, Err(CoreError::InvalidStateTransition(_))));

    Ok(())
}

#[tokio::test]
async fn test_restricted_template_needs_grant() -> anyhow::Result<()> {
    let workspace = workspace();
    let templates = workspace.templates();
    let restricted = templates
        .register_tool(
            ApplicationTemplate::tool("theia", "Theia", "theia", "{}")
                .with_user_access_type(UserAccessType::RequiresAuthorization),
        )
        .await?;
    let instances = workspace.instances();

    let denied = instances
        .launch(&restricted.id, UserId(7), "theia-7", LaunchRequest::default())
        .await;
    assert!(matches!(denied, Err(CoreError::AccessDenied(_))));

    templates.grant_access(UserId(1), UserId(7), &restricted.id).await?;
    assert!(templates.user_has_access(&restricted, &UserId(7)).await?);

    let duplicate = templates.grant_access(UserId(1), UserId(7), &restricted.id).await;
    assert!(matches!(duplicate, Err(CoreError::IntegrityError(_))));

    let instance = instances
        .launch(&restricted.id, UserId(7), "theia-7", LaunchRequest::default())
        .await?;
    let db_user = instances
        .register_db_user(&instance.id, DatabaseId(1), "user_theia_7")
        .await?;
    assert_eq!(instances.db_users_for_instance(&instance.id).await?, vec![db_user]);

    assert!(templates.revoke_access(UserId(1), UserId(7), &restricted.id).await?);
    assert!(!templates.user_has_access(&restricted, &UserId(7)).await?);

    Ok(())
}

#[tokio::test]
async fn test_visualisation_approval_flow() -> anyhow::Result<()> {
    let workspace = workspace();
    let visualisation = workspace
        .templates()
        .register_visualisation(ApplicationTemplate::visualisation("dashboard", "Dashboard", "dashboard", "{}"))
        .await?;
    let approvals = workspace.approvals();

    let first = approvals.approve(&visualisation.id, UserId(1)).await?;
    assert_eq!(first.event.event_type, EventType::VisualisationApproved);
    assert!(approvals.is_approved(&visualisation.id).await?);

    let rescinded = approvals.rescind(&first.approval.id).await?;
    assert_eq!(rescinded.event.event_type, EventType::VisualisationUnapproved);
    assert!(!approvals.is_approved(&visualisation.id).await?);

    let again = approvals.rescind(&first.approval.id).await;
    assert_eq!(
        again.unwrap_err(),
        CoreError::InvalidApprovalTransition(ApprovalTransitionError::UnchangedDecision)
    );

    let mut flipped = rescinded.approval.clone();
    flipped.approved = true;
    let flip = approvals.save(&flipped).await;
    assert_eq!(
        flip.unwrap_err(),
        CoreError::InvalidApprovalTransition(ApprovalTransitionError::RescindedCannotBeReapproved)
    );

    // Re-approval takes a new record
    approvals.approve(&visualisation.id, UserId(2)).await?;
    assert!(approvals.is_approved(&visualisation.id).await?);
    assert_eq!(approvals.approvals_for(&visualisation.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_tools_cannot_be_approved() -> anyhow::Result<()> {
    let workspace = workspace();
    let tool = workspace
        .templates()
        .register_tool(ApplicationTemplate::tool("jupyterlab", "JupyterLab", "jupyterlab", "{}"))
        .await?;

    let result = workspace.approvals().approve(&tool.id, UserId(1)).await;
    assert!(matches!(result, Err(CoreError::ValidationError(_))));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_rescinds_emit_one_event() -> anyhow::Result<()> {
    let workspace = workspace();
    let visualisation = workspace
        .templates()
        .register_visualisation(ApplicationTemplate::visualisation("dashboard", "Dashboard", "dashboard", "{}"))
        .await?;
    let approval = workspace.approvals().approve(&visualisation.id, UserId(1)).await?.approval;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let approvals = workspace.approvals();
        let id = approval.id;
        handles.push(tokio::spawn(async move { approvals.rescind(&id).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);

    let events = workspace
        .repositories()
        .audit_log
        .list_for_object(&RelatedObject::VisualisationApproval(approval.id))
        .await?;
    assert_eq!(events.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_invalid_template_name_is_rejected() -> anyhow::Result<()> {
    let workspace = workspace();
    let result = workspace
        .templates()
        .register_tool(ApplicationTemplate::tool("Jupyter-Lab", "JupyterLab", "jupyterlab", "{}"))
        .await;
    assert!(matches!(result, Err(CoreError::ValidationError(_))));
    assert!(workspace.templates().list_tools().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_site_context_uses_configured_domain() {
    let workspace = workspace();
    let context = workspace.site_context("https");
    assert_eq!(context.root_href, "https://dataworkspace.test:8000/");
    assert!(!context.can_see_visualisations_tab);
}

#[tokio::test]
async fn test_connect_without_database_url_uses_memory() -> anyhow::Result<()> {
    let config = WorkspaceConfig::from_lookup(|key| match key {
        "APPLICATION_ROOT_DOMAIN" => Some("dataworkspace.test".to_string()),
        _ => None,
    })?;
    let workspace = Workspace::connect(config).await?;

    workspace
        .templates()
        .register_tool(ApplicationTemplate::tool("pgadmin", "pgAdmin", "pgadmin", "{}"))
        .await?;
    assert_eq!(workspace.templates().list_tools().await?.len(), 1);

    Ok(())
}
