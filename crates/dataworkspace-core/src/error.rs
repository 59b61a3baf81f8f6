use thiserror::Error;

/// Reasons a visualisation approval write is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalTransitionError {
    /// A rescinded approval was flipped back to approved
    #[error("A new record must be created for a new approval - you cannot flip a rescinded approval")]
    RescindedCannotBeReapproved,

    /// A saved approval was saved again without changing its decision
    #[error("The only change that can be made to an approval is to unapprove it")]
    UnchangedDecision,
}

/// Core error type for Data Workspace applications
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Rejected write to a visualisation approval
    #[error("Invalid approval transition: {0}")]
    InvalidApprovalTransition(#[from] ApprovalTransitionError),

    /// Application instance state machine violation
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Uniqueness constraint violated in the backing store
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// User lacks access to a template
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl CoreError {
    /// Whether this error came from a store-level uniqueness violation
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, CoreError::IntegrityError(_))
    }
}
