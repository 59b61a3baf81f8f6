use serde::{Deserialize, Serialize};

use super::identifiers::{TemplateId, UserId};

/// Grant of access to an application template for one user.
/// Unique on (user, template).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationTemplateUserPermission {
    /// Grantee
    pub user: UserId,
    /// Template the grant applies to
    pub application_template: TemplateId,
}

impl ApplicationTemplateUserPermission {
    /// Create a grant
    pub fn new(user: UserId, application_template: TemplateId) -> Self {
        Self {
            user,
            application_template,
        }
    }
}
