use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{DatabaseId, DbUserId, InstanceId};
use super::validation::{check_max_length, check_not_blank};
use crate::CoreError;

/// Maximum length of a generated database username
pub const MAX_DB_USERNAME_LENGTH: usize = 256;

/// Database credentials created for an application instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInstanceDbUser {
    /// Unique identifier
    pub id: DbUserId,
    /// Database the user was created in
    pub db: DatabaseId,
    /// Username in that database
    pub db_username: String,
    /// Instance the credentials belong to
    pub application_instance: InstanceId,
    /// Creation timestamp
    pub created_date: DateTime<Utc>,
}

impl ApplicationInstanceDbUser {
    /// Record a new database user for `application_instance`
    pub fn new(
        application_instance: InstanceId,
        db: DatabaseId,
        db_username: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let db_username = db_username.into();
        check_not_blank("db_username", &db_username)?;
        check_max_length("db_username", &db_username, MAX_DB_USERNAME_LENGTH)?;

        Ok(Self {
            id: DbUserId::new_v4(),
            db,
            db_username,
            application_instance,
            created_date: Utc::now(),
        })
    }
}
