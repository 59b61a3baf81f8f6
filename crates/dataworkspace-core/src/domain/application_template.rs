use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::identifiers::TemplateId;
use super::validation::{check_max_length, check_not_blank, is_valid_template_name};
use crate::CoreError;

/// Maximum length of the name, nice name and host basename
pub const MAX_TEMPLATE_NAME_LENGTH: usize = 128;

/// Maximum length of the spawner options blob
pub const MAX_SPAWNER_OPTIONS_LENGTH: usize = 10240;

/// Generates `as_str`, `Display` and `FromStr` for a database-facing enum
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The stored representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::SerializationError(format!(
                        "Unknown {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use string_enum;

/// What kind of application a template launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    /// A separate instance launched for each user
    Tool,
    /// One instance launched and accessed by all authorized users
    Visualisation,
}

string_enum!(ApplicationType {
    Tool => "TOOL",
    Visualisation => "VISUALISATION",
});

/// Which subsystem starts the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpawnerKind {
    /// Local process
    Process,
    /// AWS Fargate task
    Fargate,
}

string_enum!(SpawnerKind {
    Process => "PROCESS",
    Fargate => "FARGATE",
});

/// How the application is presented in the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WrapMode {
    /// No wrapping
    None,
    /// Wrapped in a full height iframe
    FullHeightIframe,
}

string_enum!(WrapMode {
    None => "NONE",
    FullHeightIframe => "FULL_HEIGHT_IFRAME",
});

/// Who may open the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAccessType {
    /// Any authenticated user
    RequiresAuthentication,
    /// Only users with an explicit grant
    RequiresAuthorization,
}

string_enum!(UserAccessType {
    RequiresAuthentication => "REQUIRES_AUTHENTICATION",
    RequiresAuthorization => "REQUIRES_AUTHORIZATION",
});

/// Static definition of a launchable tool or visualisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationTemplate {
    /// Unique identifier
    pub id: TemplateId,

    /// Used in URLs: lowercase letters only
    pub name: String,

    /// For tools, whether it is listed. For visualisations, whether it is
    /// reachable at its production URL.
    pub visible: bool,

    /// Presentation wrapper
    pub wrap: WrapMode,

    /// Leftmost part of the host name. Globally unique.
    pub host_basename: String,

    /// Display name
    pub nice_name: String,

    /// Spawner used to start instances
    pub spawner: SpawnerKind,

    /// Expected spawn time in seconds
    pub spawner_time: i32,

    /// Options that the spawner understands to start the application
    pub spawner_options: String,

    /// Tool or visualisation
    pub application_type: ApplicationType,

    /// Authentication or authorization required
    pub user_access_type: UserAccessType,

    /// The ID of the corresponding project in GitLab
    pub gitlab_project_id: Option<i64>,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_date: DateTime<Utc>,
}

impl ApplicationTemplate {
    /// Create a template with the default settings: a visible, unwrapped tool
    /// spawned on Fargate that any authenticated user may open.
    pub fn new(
        name: impl Into<String>,
        nice_name: impl Into<String>,
        host_basename: impl Into<String>,
        spawner_options: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TemplateId::new_v4(),
            name: name.into(),
            visible: true,
            wrap: WrapMode::None,
            host_basename: host_basename.into(),
            nice_name: nice_name.into(),
            spawner: SpawnerKind::Fargate,
            spawner_time: 0,
            spawner_options: spawner_options.into(),
            application_type: ApplicationType::Tool,
            user_access_type: UserAccessType::RequiresAuthentication,
            gitlab_project_id: None,
            created_date: now,
            modified_date: now,
        }
    }

    /// Create a tool template
    pub fn tool(
        name: impl Into<String>,
        nice_name: impl Into<String>,
        host_basename: impl Into<String>,
        spawner_options: impl Into<String>,
    ) -> Self {
        Self::new(name, nice_name, host_basename, spawner_options)
            .with_application_type(ApplicationType::Tool)
    }

    /// Create a visualisation template
    pub fn visualisation(
        name: impl Into<String>,
        nice_name: impl Into<String>,
        host_basename: impl Into<String>,
        spawner_options: impl Into<String>,
    ) -> Self {
        Self::new(name, nice_name, host_basename, spawner_options)
            .with_application_type(ApplicationType::Visualisation)
    }

    /// Set the application type
    pub fn with_application_type(mut self, application_type: ApplicationType) -> Self {
        self.application_type = application_type;
        self
    }

    /// Set the access type
    pub fn with_user_access_type(mut self, user_access_type: UserAccessType) -> Self {
        self.user_access_type = user_access_type;
        self
    }

    /// Set the spawner kind
    pub fn with_spawner(mut self, spawner: SpawnerKind) -> Self {
        self.spawner = spawner;
        self
    }

    /// Set the GitLab project id
    pub fn with_gitlab_project_id(mut self, project_id: i64) -> Self {
        self.gitlab_project_id = Some(project_id);
        self
    }

    /// Check field-level constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        if !is_valid_template_name(&self.name) {
            return Err(CoreError::ValidationError(format!(
                "Template name '{}' may only contain lowercase letters",
                self.name
            )));
        }
        check_max_length("name", &self.name, MAX_TEMPLATE_NAME_LENGTH)?;
        check_not_blank("host_basename", &self.host_basename)?;
        check_max_length("host_basename", &self.host_basename, MAX_TEMPLATE_NAME_LENGTH)?;
        check_not_blank("nice_name", &self.nice_name)?;
        check_max_length("nice_name", &self.nice_name, MAX_TEMPLATE_NAME_LENGTH)?;
        check_max_length("spawner_options", &self.spawner_options, MAX_SPAWNER_OPTIONS_LENGTH)?;
        Ok(())
    }

    /// Whether this template is a visualisation
    pub fn is_visualisation(&self) -> bool {
        self.application_type == ApplicationType::Visualisation
    }

    /// Whether access needs an explicit per-user grant
    pub fn requires_authorization(&self) -> bool {
        self.user_access_type == UserAccessType::RequiresAuthorization
    }

    /// Whether a user may open this application, given whether they hold a grant
    pub fn user_has_access(&self, has_explicit_grant: bool) -> bool {
        !self.requires_authorization() || has_explicit_grant
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.modified_date = Utc::now();
    }
}

impl fmt::Display for ApplicationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nice_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let template = ApplicationTemplate::new("jupyterlab", "JupyterLab", "jupyterlab", "{}");
        assert_eq!(template.application_type, ApplicationType::Tool);
        assert_eq!(template.spawner, SpawnerKind::Fargate);
        assert_eq!(template.wrap, WrapMode::None);
        assert_eq!(template.user_access_type, UserAccessType::RequiresAuthentication);
        assert!(template.visible);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_visualisation_constructor_forces_type() {
        let template = ApplicationTemplate::visualisation("dashboard", "Dashboard", "dash", "{}");
        assert!(template.is_visualisation());
        assert_eq!(template.to_string(), "Dashboard");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let template = ApplicationTemplate::tool("Rstudio", "RStudio", "rstudio", "{}");
        assert!(matches!(template.validate(), Err(CoreError::ValidationError(_))));

        let template = ApplicationTemplate::tool("rstudio", "RStudio", "", "{}");
        assert!(matches!(template.validate(), Err(CoreError::ValidationError(_))));

        let template = ApplicationTemplate::tool("rstudio", "RStudio", "rstudio", "x".repeat(10241));
        assert!(matches!(template.validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_user_has_access() {
        let open = ApplicationTemplate::tool("rstudio", "RStudio", "rstudio", "{}");
        assert!(open.user_has_access(false));

        let restricted = open.with_user_access_type(UserAccessType::RequiresAuthorization);
        assert!(!restricted.user_has_access(false));
        assert!(restricted.user_has_access(true));
    }

    #[test]
    fn test_string_enum_round_trip() {
        assert_eq!("FULL_HEIGHT_IFRAME".parse::<WrapMode>().unwrap(), WrapMode::FullHeightIframe);
        assert_eq!(UserAccessType::RequiresAuthorization.as_str(), "REQUIRES_AUTHORIZATION");
        assert!("LAMBDA".parse::<SpawnerKind>().is_err());
        assert_eq!(
            serde_json::to_value(ApplicationType::Visualisation).unwrap(),
            serde_json::json!("VISUALISATION")
        );
    }
}
