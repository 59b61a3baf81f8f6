//! Audit events recorded against platform objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::application_template::string_enum;
use super::identifiers::{ApprovalId, EventId, InstanceId, TemplateId, UserId};
use crate::CoreError;

/// Kind of audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A visualisation was approved
    VisualisationApproved,
    /// A visualisation approval was rescinded
    VisualisationUnapproved,
    /// An application instance was requested
    ApplicationInstanceLaunched,
    /// An application instance stopped
    ApplicationInstanceStopped,
    /// A user was granted access to a template
    TemplateAccessGranted,
    /// A user's access to a template was revoked
    TemplateAccessRevoked,
}

string_enum!(EventType {
    VisualisationApproved => "VISUALISATION_APPROVED",
    VisualisationUnapproved => "VISUALISATION_UNAPPROVED",
    ApplicationInstanceLaunched => "APPLICATION_INSTANCE_LAUNCHED",
    ApplicationInstanceStopped => "APPLICATION_INSTANCE_STOPPED",
    TemplateAccessGranted => "TEMPLATE_ACCESS_GRANTED",
    TemplateAccessRevoked => "TEMPLATE_ACCESS_REVOKED",
});

/// Reference to the object an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum RelatedObject {
    /// An application template
    ApplicationTemplate(TemplateId),
    /// An application instance
    ApplicationInstance(InstanceId),
    /// A visualisation approval
    VisualisationApproval(ApprovalId),
}

impl RelatedObject {
    /// Stored name of the object type
    pub fn object_type(&self) -> &'static str {
        match self {
            RelatedObject::ApplicationTemplate(_) => "application_template",
            RelatedObject::ApplicationInstance(_) => "application_instance",
            RelatedObject::VisualisationApproval(_) => "visualisation_approval",
        }
    }

    /// Stored identifier of the object
    pub fn object_id(&self) -> uuid::Uuid {
        match self {
            RelatedObject::ApplicationTemplate(id) => id.0,
            RelatedObject::ApplicationInstance(id) => id.0,
            RelatedObject::VisualisationApproval(id) => id.0,
        }
    }

    /// Rebuild a reference from its stored parts
    pub fn from_parts(object_type: &str, object_id: uuid::Uuid) -> Result<Self, CoreError> {
        match object_type {
            "application_template" => Ok(RelatedObject::ApplicationTemplate(TemplateId(object_id))),
            "application_instance" => Ok(RelatedObject::ApplicationInstance(InstanceId(object_id))),
            "visualisation_approval" => Ok(RelatedObject::VisualisationApproval(ApprovalId(object_id))),
            other => Err(CoreError::SerializationError(format!(
                "Unknown related object type: {}",
                other
            ))),
        }
    }
}

/// One audit log record: who did what to which object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Unique identifier
    pub id: EventId,
    /// Acting user
    pub user: UserId,
    /// What happened
    pub event_type: EventType,
    /// Subject of the event
    pub related_object: RelatedObject,
    /// Free-form details
    pub extra: serde_json::Value,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    /// Create an entry timestamped now
    pub fn new(user: UserId, event_type: EventType, related_object: RelatedObject) -> Self {
        Self {
            id: EventId::new_v4(),
            user,
            event_type,
            related_object,
            extra: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attach details
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}
