use std::sync::Arc;

use crate::{
    domain::identifiers::{ApprovalId, TemplateId, UserId},
    domain::repository::{ApplicationTemplateRepository, VisualisationApprovalRepository},
    domain::visualisation_approval::{ApprovalSave, VisualisationApproval},
    CoreError,
};

/// Service for approving visualisations and rescinding approvals
pub struct ApprovalService {
    templates: Arc<dyn ApplicationTemplateRepository>,
    approvals: Arc<dyn VisualisationApprovalRepository>,
}

impl ApprovalService {
    /// Create a new approval service
    pub fn new(
        templates: Arc<dyn ApplicationTemplateRepository>,
        approvals: Arc<dyn VisualisationApprovalRepository>,
    ) -> Self {
        Self { templates, approvals }
    }

    /// Record a new approval of a visualisation by `approver`
    pub async fn approve(&self, visualisation: &TemplateId, approver: UserId) -> Result<ApprovalSave, CoreError> {
        let template = self
            .templates
            .find_by_id(visualisation)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Visualisation {}", visualisation)))?;

        if !template.is_visualisation() {
            return Err(CoreError::ValidationError(format!(
                "{} is not a visualisation",
                template.host_basename
            )));
        }

        let saved = self.save(&VisualisationApproval::new(template.id, approver)).await?;
        tracing::info!(
            approval_id = %saved.approval.id,
            visualisation = %template.id,
            approver = %approver,
            "Visualisation approved"
        );
        Ok(saved)
    }

    /// Rescind an existing approval
    pub async fn rescind(&self, id: &ApprovalId) -> Result<ApprovalSave, CoreError> {
        let mut approval = self
            .approvals
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Visualisation approval {}", id)))?;

        approval.rescind();
        let saved = self.save(&approval).await?;
        tracing::info!(
            approval_id = %saved.approval.id,
            visualisation = %saved.approval.visualisation,
            "Visualisation approval rescinded"
        );
        Ok(saved)
    }

    /// Save a record through the guarded store path
    pub async fn save(&self, approval: &VisualisationApproval) -> Result<ApprovalSave, CoreError> {
        match self.approvals.save(approval).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                tracing::warn!(approval_id = %approval.id, error = %e, "Approval write rejected");
                Err(e)
            }
        }
    }

    /// Approval history of a visualisation, oldest first
    pub async fn approvals_for(&self, visualisation: &TemplateId) -> Result<Vec<VisualisationApproval>, CoreError> {
        self.approvals.list_for_visualisation(visualisation).await
    }

    /// Whether any approval of the visualisation is still in force
    pub async fn is_approved(&self, visualisation: &TemplateId) -> Result<bool, CoreError> {
        let approvals = self.approvals.list_for_visualisation(visualisation).await?;
        Ok(approvals.iter().any(|a| a.approved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application_template::ApplicationTemplate;
    use crate::domain::event_log::EventType;
    use crate::domain::repository::{MockApplicationTemplateRepository, MockVisualisationApprovalRepository};
    use crate::error::ApprovalTransitionError;

    #[tokio::test]
    async fn test_approve_rejects_tools() {
        let tool = ApplicationTemplate::tool("jupyterlab", "JupyterLab", "jupyterlab", "{}");
        let mut templates = MockApplicationTemplateRepository::new();
        templates
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tool.clone())));
        let mut approvals = MockVisualisationApprovalRepository::new();
        approvals.expect_save().never();

        let service = ApprovalService::new(Arc::new(templates), Arc::new(approvals));
        let result = service.approve(&TemplateId::new_v4(), UserId(1)).await;

        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_approve_saves_new_approved_record() {
        let visualisation = ApplicationTemplate::visualisation("dashboard", "Dashboard", "dash", "{}");
        let mut templates = MockApplicationTemplateRepository::new();
        templates
            .expect_find_by_id()
            .returning(move |_| Ok(Some(visualisation.clone())));
        let mut approvals = MockVisualisationApprovalRepository::new();
        approvals
            .expect_save()
            .withf(|a| a.approved && !a.is_saved())
            .times(1)
            .returning(|a| Ok(a.prepare_save(None)?));

        let service = ApprovalService::new(Arc::new(templates), Arc::new(approvals));
        let saved = service.approve(&TemplateId::new_v4(), UserId(4)).await.unwrap();

        assert_eq!(saved.event.event_type, EventType::VisualisationApproved);
        assert_eq!(saved.event.user, UserId(4));
    }

    #[tokio::test]
    async fn test_rescind_flips_and_saves() {
        let stored = VisualisationApproval::new(TemplateId::new_v4(), UserId(4))
            .prepare_save(None)
            .unwrap()
            .approval;
        let id = stored.id;

        let mut approvals = MockVisualisationApprovalRepository::new();
        approvals
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        approvals
            .expect_save()
            .withf(|a| !a.approved)
            .times(1)
            .returning(|a| Ok(a.prepare_save(Some(&VisualisationApproval { approved: true, ..a.clone() }))?));

        let service = ApprovalService::new(Arc::new(MockApplicationTemplateRepository::new()), Arc::new(approvals));
        let saved = service.rescind(&id).await.unwrap();

        assert!(!saved.approval.approved);
        assert_eq!(saved.event.event_type, EventType::VisualisationUnapproved);
    }

    #[tokio::test]
    async fn test_rescind_twice_surfaces_guard_error() {
        let mut approvals = MockVisualisationApprovalRepository::new();
        approvals.expect_find_by_id().returning(|_| {
            let mut approval = VisualisationApproval::new(TemplateId::new_v4(), UserId(4));
            approval.rescind();
            Ok(Some(approval))
        });
        approvals
            .expect_save()
            .returning(|a| Ok(a.prepare_save(Some(&VisualisationApproval { approved: false, ..a.clone() }))?));

        let service = ApprovalService::new(Arc::new(MockApplicationTemplateRepository::new()), Arc::new(approvals));
        let result = service.rescind(&ApprovalId::new_v4()).await;

        assert_eq!(
            result.unwrap_err(),
            CoreError::InvalidApprovalTransition(ApprovalTransitionError::UnchangedDecision)
        );
    }
}
