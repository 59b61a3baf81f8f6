//! Visualisation approvals.
//!
//! An approval record is written once, and may afterwards be written exactly
//! once more to rescind it. Any other write is rejected: re-approving a
//! rescinded visualisation needs a new record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event_log::{EventLogEntry, EventType, RelatedObject};
use super::identifiers::{ApprovalId, TemplateId, UserId};
use crate::error::ApprovalTransitionError;

/// Decide whether an approval may move from its persisted decision to `next`.
///
/// `previous` is the decision currently stored, or `None` when the record has
/// never been saved. Returns the audit event the save must emit.
pub fn check_approval_transition(
    previous: Option<bool>,
    next: bool,
) -> Result<EventType, ApprovalTransitionError> {
    match (previous, next) {
        (Some(false), true) => Err(ApprovalTransitionError::RescindedCannotBeReapproved),
        (Some(previous), next) if previous == next => Err(ApprovalTransitionError::UnchangedDecision),
        (_, true) => Ok(EventType::VisualisationApproved),
        (_, false) => Ok(EventType::VisualisationUnapproved),
    }
}

/// Approval (or rescission) of a visualisation by an approver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualisationApproval {
    /// Unique identifier
    pub id: ApprovalId,

    /// Current decision
    pub approved: bool,

    /// User that made the decision
    pub approver: UserId,

    /// Visualisation template the decision applies to
    pub visualisation: TemplateId,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Set on every successful save; `None` until the first one
    pub modified_date: Option<DateTime<Utc>>,
}

/// Result of a validated save: the record as persisted and its audit event
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalSave {
    /// Record as written
    pub approval: VisualisationApproval,
    /// Event emitted in the same transaction
    pub event: EventLogEntry,
}

impl VisualisationApproval {
    /// Create an unsaved approval
    pub fn new(visualisation: TemplateId, approver: UserId) -> Self {
        Self {
            id: ApprovalId::new_v4(),
            approved: true,
            approver,
            visualisation,
            created_date: Utc::now(),
            modified_date: None,
        }
    }

    /// Withdraw the approval. Takes effect on the next save.
    pub fn rescind(&mut self) {
        self.approved = false;
    }

    /// Whether the record has been saved at least once
    pub fn is_saved(&self) -> bool {
        self.modified_date.is_some()
    }

    /// Validate a save against the stored record and build what must be
    /// written. Stores call this inside the transaction that performs the write.
    ///
    /// On update only the decision and the approver change. The visualisation
    /// and creation date keep their stored values.
    pub fn prepare_save(&self, stored: Option<&VisualisationApproval>) -> Result<ApprovalSave, ApprovalTransitionError> {
        let event_type = check_approval_transition(stored.map(|s| s.approved), self.approved)?;

        let mut approval = self.clone();
        if let Some(stored) = stored {
            approval.visualisation = stored.visualisation;
            approval.created_date = stored.created_date;
        }
        approval.modified_date = Some(Utc::now());

        let event = EventLogEntry::new(
            approval.approver,
            event_type,
            RelatedObject::VisualisationApproval(approval.id),
        );

        Ok(ApprovalSave { approval, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_save_emits_event_for_decision() {
        assert_eq!(check_approval_transition(None, true), Ok(EventType::VisualisationApproved));
        assert_eq!(check_approval_transition(None, false), Ok(EventType::VisualisationUnapproved));
    }

    #[test]
    fn test_rescind_is_allowed() {
        assert_eq!(
            check_approval_transition(Some(true), false),
            Ok(EventType::VisualisationUnapproved)
        );
    }

    #[test]
    fn test_rescinded_cannot_be_reapproved() {
        assert_eq!(
            check_approval_transition(Some(false), true),
            Err(ApprovalTransitionError::RescindedCannotBeReapproved)
        );
    }

    #[test]
    fn test_unchanged_decision_is_rejected() {
        assert_eq!(
            check_approval_transition(Some(true), true),
            Err(ApprovalTransitionError::UnchangedDecision)
        );
        assert_eq!(
            check_approval_transition(Some(false), false),
            Err(ApprovalTransitionError::UnchangedDecision)
        );
    }

    #[test]
    fn test_prepare_save_marks_record_saved() {
        let approval = VisualisationApproval::new(TemplateId::new_v4(), UserId(3));
        assert!(!approval.is_saved());

        let save = approval.prepare_save(None).unwrap();
        assert!(save.approval.is_saved());
        assert!(!approval.is_saved());
        assert_eq!(save.event.user, UserId(3));
        assert_eq!(save.event.event_type, EventType::VisualisationApproved);
        assert_eq!(save.event.related_object, RelatedObject::VisualisationApproval(approval.id));
    }

    #[test]
    fn test_prepare_save_after_rescind() {
        let mut approval = VisualisationApproval::new(TemplateId::new_v4(), UserId(3));
        approval.rescind();

        let stored = VisualisationApproval::new(approval.visualisation, UserId(3));
        let save = approval.prepare_save(Some(&VisualisationApproval { id: approval.id, ..stored })).unwrap();
        assert!(!save.approval.approved);
        assert_eq!(save.event.event_type, EventType::VisualisationUnapproved);
    }

    #[test]
    fn test_prepare_save_keeps_stored_visualisation_and_creation() {
        let stored = VisualisationApproval::new(TemplateId::new_v4(), UserId(3))
            .prepare_save(None)
            .unwrap()
            .approval;

        let mut edited = stored.clone();
        edited.rescind();
        edited.visualisation = TemplateId::new_v4();
        edited.created_date = Utc::now() + chrono::Duration::days(1);
        edited.approver = UserId(9);

        let save = edited.prepare_save(Some(&stored)).unwrap();
        assert_eq!(save.approval.visualisation, stored.visualisation);
        assert_eq!(save.approval.created_date, stored.created_date);
        assert_eq!(save.approval.approver, UserId(9));
        assert!(!save.approval.approved);
    }

    #[test]
    fn test_unsaved_record_flipped_to_approved_counts_as_first_approval() {
        // The guard compares against what is persisted, not what was built
        let mut approval = VisualisationApproval::new(TemplateId::new_v4(), UserId(3));
        approval.rescind();
        approval.approved = true;

        let save = approval.prepare_save(None).unwrap();
        assert!(save.approval.approved);
        assert_eq!(save.event.event_type, EventType::VisualisationApproved);
    }
}
