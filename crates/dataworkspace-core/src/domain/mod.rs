/// Identifier value objects
pub mod identifiers;

/// Field validators and name patterns
pub mod validation;

/// Application template domain model
pub mod application_template;

/// Application instance domain model and state machine
pub mod application_instance;

/// Visualisation approvals and their transition guard
pub mod visualisation_approval;

/// Per-user template grants
pub mod template_permission;

/// Database users created for instances
pub mod db_user;

/// Reference dataset fields
pub mod dataset_field;

/// Audit events
pub mod event_log;

/// Repository interfaces
pub mod repository;
