use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::application_template::{string_enum, ApplicationTemplate, SpawnerKind};
use super::identifiers::{InstanceId, TemplateId, UserId};
use super::validation::{check_max_length, check_not_blank};
use crate::CoreError;

/// Maximum length of a public host label
pub const MAX_PUBLIC_HOST_LENGTH: usize = 63;

/// Maximum length of the proxy URL
pub const MAX_PROXY_URL_LENGTH: usize = 256;

/// Maximum length of the spawner's instance identifier
pub const MAX_SPAWNER_INSTANCE_ID_LENGTH: usize = 128;

/// Maximum length of cpu and memory values
pub const MAX_RESOURCE_LENGTH: usize = 16;

/// Maximum length of a commit id
pub const MAX_COMMIT_ID_LENGTH: usize = 8;

/// Lifecycle state of an application instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    /// Requested and being started by the spawner
    Spawning,
    /// Reachable through the proxy
    Running,
    /// Terminal
    Stopped,
}

string_enum!(InstanceState {
    Spawning => "SPAWNING",
    Running => "RUNNING",
    Stopped => "STOPPED",
});

impl InstanceState {
    /// States that occupy a public host. At most one instance per host may be
    /// in one of these at any time.
    pub const ACTIVE: [InstanceState; 2] = [InstanceState::Spawning, InstanceState::Running];

    /// Whether this state occupies the public host
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: InstanceState) -> bool {
        matches!(
            (self, next),
            (InstanceState::Spawning, InstanceState::Running)
                | (InstanceState::Spawning, InstanceState::Stopped)
                | (InstanceState::Running, InstanceState::Stopped)
        )
    }
}

/// Status and resource usage reported back by a spawner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnerReport {
    /// When the spawner created the compute resource
    pub created_at: Option<DateTime<Utc>>,
    /// When the spawner stopped the compute resource
    pub stopped_at: Option<DateTime<Utc>>,
    /// CPU allocated by the spawner
    pub cpu: Option<String>,
    /// Memory allocated by the spawner
    pub memory: Option<String>,
}

/// Parameters of a launch request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Requested CPU, if the user specified one
    pub cpu: Option<String>,
    /// Requested memory, if the user specified one
    pub memory: Option<String>,
    /// Commit of the application to run, for visualisations
    pub commit_id: Option<String>,
}

/// Aggregate: one launch of a template for an owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInstance {
    /// Unique identifier
    pub id: InstanceId,

    /// User that launched the instance
    pub owner: UserId,

    /// The leftmost part of the domain name of this application. Stored
    /// explicitly so matching survives URL scheme changes.
    pub public_host: String,

    /// Template the instance was launched from
    pub application_template: TemplateId,

    /// Spawner used to start the application
    pub spawner: SpawnerKind,

    /// Spawner options at the time the instance was spawned
    pub spawner_application_template_options: String,

    /// An ID that the spawner understands to control and report on the application
    pub spawner_application_instance_id: String,

    /// As reported by the spawner
    pub spawner_created_at: Option<DateTime<Utc>>,

    /// As reported by the spawner
    pub spawner_stopped_at: Option<DateTime<Utc>>,

    /// As reported by the spawner
    pub spawner_cpu: Option<String>,

    /// As reported by the spawner
    pub spawner_memory: Option<String>,

    /// Lifecycle state
    pub state: InstanceState,

    /// The URL that the proxy can proxy HTTP and WebSockets requests to
    pub proxy_url: String,

    /// Requested CPU, kept as a string as the spawner expects
    pub cpu: Option<String>,

    /// Requested memory, kept as a string as the spawner expects
    pub memory: Option<String>,

    /// Commit the instance runs
    pub commit_id: Option<String>,

    /// Creation timestamp
    pub created_date: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_date: DateTime<Utc>,
}

impl ApplicationInstance {
    /// Create a SPAWNING instance of `template` for `owner`, freezing a copy
    /// of the template's spawner settings.
    pub fn spawn(
        template: &ApplicationTemplate,
        owner: UserId,
        public_host: impl Into<String>,
        request: LaunchRequest,
    ) -> Result<Self, CoreError> {
        let now = Utc::now();
        let instance = Self {
            id: InstanceId::new_v4(),
            owner,
            public_host: public_host.into(),
            application_template: template.id,
            spawner: template.spawner,
            spawner_application_template_options: template.spawner_options.clone(),
            spawner_application_instance_id: String::new(),
            spawner_created_at: None,
            spawner_stopped_at: None,
            spawner_cpu: None,
            spawner_memory: None,
            state: InstanceState::Spawning,
            proxy_url: String::new(),
            cpu: request.cpu,
            memory: request.memory,
            commit_id: request.commit_id,
            created_date: now,
            modified_date: now,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Check field-level constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        check_not_blank("public_host", &self.public_host)?;
        check_max_length("public_host", &self.public_host, MAX_PUBLIC_HOST_LENGTH)?;
        check_max_length("proxy_url", &self.proxy_url, MAX_PROXY_URL_LENGTH)?;
        check_max_length(
            "spawner_application_instance_id",
            &self.spawner_application_instance_id,
            MAX_SPAWNER_INSTANCE_ID_LENGTH,
        )?;
        for (field, value) in [
            ("cpu", &self.cpu),
            ("memory", &self.memory),
            ("spawner_cpu", &self.spawner_cpu),
            ("spawner_memory", &self.spawner_memory),
        ] {
            if let Some(value) = value {
                check_max_length(field, value, MAX_RESOURCE_LENGTH)?;
            }
        }
        if let Some(commit_id) = &self.commit_id {
            check_max_length("commit_id", commit_id, MAX_COMMIT_ID_LENGTH)?;
        }
        Ok(())
    }

    /// Whether the instance currently occupies its public host
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// The key that must be unique across all active instances, or `None`
    /// once the instance no longer occupies its host.
    pub fn active_host_key(&self) -> Option<&str> {
        if self.is_active() {
            Some(&self.public_host)
        } else {
            None
        }
    }

    fn transition(&mut self, next: InstanceState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition(format!(
                "Instance {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    /// The spawner has the application up and reachable at `proxy_url`
    pub fn mark_running(
        &mut self,
        spawner_application_instance_id: impl Into<String>,
        proxy_url: impl Into<String>,
    ) -> Result<(), CoreError> {
        let spawner_id = spawner_application_instance_id.into();
        let proxy_url = proxy_url.into();
        check_max_length("spawner_application_instance_id", &spawner_id, MAX_SPAWNER_INSTANCE_ID_LENGTH)?;
        check_max_length("proxy_url", &proxy_url, MAX_PROXY_URL_LENGTH)?;

        self.transition(InstanceState::Running)?;
        self.spawner_application_instance_id = spawner_id;
        self.proxy_url = proxy_url;
        Ok(())
    }

    /// The application has stopped. Terminal.
    pub fn mark_stopped(&mut self, stopped_at: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        self.transition(InstanceState::Stopped)?;
        if stopped_at.is_some() {
            self.spawner_stopped_at = stopped_at;
        }
        Ok(())
    }

    /// Record what the spawner reports; fields absent from the report are kept
    pub fn apply_spawner_report(&mut self, report: SpawnerReport) -> Result<(), CoreError> {
        if let Some(cpu) = &report.cpu {
            check_max_length("spawner_cpu", cpu, MAX_RESOURCE_LENGTH)?;
        }
        if let Some(memory) = &report.memory {
            check_max_length("spawner_memory", memory, MAX_RESOURCE_LENGTH)?;
        }

        if report.created_at.is_some() {
            self.spawner_created_at = report.created_at;
        }
        if report.stopped_at.is_some() {
            self.spawner_stopped_at = report.stopped_at;
        }
        if report.cpu.is_some() {
            self.spawner_cpu = report.cpu;
        }
        if report.memory.is_some() {
            self.spawner_memory = report.memory;
        }
        self.touch();
        Ok(())
    }

    /// Merge `update` onto this persisted row and return what to write.
    ///
    /// The state may stay put or move forward, never back. Fields frozen at
    /// spawn time keep their stored values. Stores call this while holding
    /// the row.
    pub fn accept_update(&self, update: &ApplicationInstance) -> Result<ApplicationInstance, CoreError> {
        if update.state != self.state && !self.state.can_transition_to(update.state) {
            return Err(CoreError::InvalidStateTransition(format!(
                "Instance {} is {} in the store and cannot move to {}",
                self.id, self.state, update.state
            )));
        }
        update.validate()?;

        Ok(ApplicationInstance {
            spawner_application_instance_id: update.spawner_application_instance_id.clone(),
            spawner_created_at: update.spawner_created_at,
            spawner_stopped_at: update.spawner_stopped_at,
            spawner_cpu: update.spawner_cpu.clone(),
            spawner_memory: update.spawner_memory.clone(),
            state: update.state,
            proxy_url: update.proxy_url.clone(),
            modified_date: update.modified_date,
            ..self.clone()
        })
    }

    /// Update the modification timestamp
    #[inline]
    pub fn touch(&mut self) {
        self.modified_date = Utc::now();
    }
}

impl fmt::Display for ApplicationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.owner, self.public_host, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> ApplicationTemplate {
        ApplicationTemplate::tool("jupyterlab", "JupyterLab", "jupyterlab", r#"{"CPU":"1024"}"#)
    }

    fn spawn() -> ApplicationInstance {
        ApplicationInstance::spawn(&template(), UserId(7), "jupyterlab-abc", LaunchRequest::default())
            .unwrap()
    }

    #[test]
    fn test_spawn_copies_spawner_settings() {
        let template = template();
        let instance = spawn();
        assert_eq!(instance.state, InstanceState::Spawning);
        assert_eq!(instance.application_template, template.id);
        assert_eq!(instance.spawner_application_template_options, r#"{"CPU":"1024"}"#);
        assert_eq!(instance.to_string(), "7 / jupyterlab-abc / SPAWNING");
    }

    #[test]
    fn test_spawn_validates_host() {
        let too_long = "a".repeat(64);
        let result = ApplicationInstance::spawn(&template(), UserId(1), too_long, LaunchRequest::default());
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_active_states_are_explicit() {
        assert!(InstanceState::Spawning.is_active());
        assert!(InstanceState::Running.is_active());
        assert!(!InstanceState::Stopped.is_active());
        assert_eq!(InstanceState::ACTIVE.len(), 2);
    }

    #[test]
    fn test_lifecycle() {
        let mut instance = spawn();
        assert_eq!(instance.active_host_key(), Some("jupyterlab-abc"));

        instance.mark_running("task-1", "http://10.0.0.1:8888").unwrap();
        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(instance.proxy_url, "http://10.0.0.1:8888");

        instance.mark_stopped(None).unwrap();
        assert_eq!(instance.state, InstanceState::Stopped);
        assert_eq!(instance.active_host_key(), None);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut instance = spawn();
        instance.mark_stopped(Some(Utc::now())).unwrap();
        assert!(instance.spawner_stopped_at.is_some());

        assert!(matches!(
            instance.mark_running("task-1", "http://x"),
            Err(CoreError::InvalidStateTransition(_))
        ));
        assert!(matches!(
            instance.mark_stopped(None),
            Err(CoreError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_running_cannot_go_back_to_spawning() {
        assert!(!InstanceState::Running.can_transition_to(InstanceState::Spawning));
        assert!(!InstanceState::Running.can_transition_to(InstanceState::Running));
        assert!(InstanceState::Spawning.can_transition_to(InstanceState::Stopped));
    }

    #[test]
    fn test_accept_update_rejects_moving_back() {
        let mut stored = spawn();
        let mut stale = stored.clone();
        stored.mark_stopped(None).unwrap();

        stale.mark_running("task-1", "http://10.0.0.1:8888").unwrap();
        assert!(matches!(
            stored.accept_update(&stale),
            Err(CoreError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_accept_update_keeps_frozen_fields() {
        let stored = spawn();
        let mut update = stored.clone();
        update.mark_running("task-1", "http://10.0.0.1:8888").unwrap();
        update.public_host = "elsewhere".to_string();
        update.cpu = Some("4096".to_string());
        update.owner = UserId(99);

        let merged = stored.accept_update(&update).unwrap();
        assert_eq!(merged.state, InstanceState::Running);
        assert_eq!(merged.proxy_url, "http://10.0.0.1:8888");
        assert_eq!(merged.public_host, "jupyterlab-abc");
        assert_eq!(merged.cpu, None);
        assert_eq!(merged.owner, UserId(7));
    }

    #[test]
    fn test_accept_update_allows_same_state() {
        let stored = spawn();
        let mut update = stored.clone();
        update
            .apply_spawner_report(SpawnerReport {
                cpu: Some("1024".to_string()),
                ..Default::default()
            })
            .unwrap();

        let merged = stored.accept_update(&update).unwrap();
        assert_eq!(merged.spawner_cpu.as_deref(), Some("1024"));
    }

    #[test]
    fn test_apply_spawner_report_keeps_missing_fields() {
        let mut instance = spawn();
        instance
            .apply_spawner_report(SpawnerReport {
                cpu: Some("1024".to_string()),
                memory: Some("8192".to_string()),
                ..Default::default()
            })
            .unwrap();
        instance.apply_spawner_report(SpawnerReport::default()).unwrap();

        assert_eq!(instance.spawner_cpu.as_deref(), Some("1024"));
        assert_eq!(instance.spawner_memory.as_deref(), Some("8192"));
    }
}
