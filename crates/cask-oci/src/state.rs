//! Container state descriptors.
//!
//! Based on the OCI Runtime Specification state format:
//! <https://github.com/opencontainers/runtime-spec/blob/main/runtime.md#state>
//!
//! The volume tooling never drives containers itself; it only reads these
//! descriptors to learn which volumes are referenced through container labels.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Container runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    /// OCI version.
    #[serde(default = "default_oci_version")]
    pub oci_version: String,
    /// Container ID.
    pub id: String,
    /// Container status.
    pub status: ContainerStatus,
    /// Process ID of the container init process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Path to the OCI bundle.
    #[serde(default)]
    pub bundle: PathBuf,
    /// Container labels.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    /// Whether the container was created with `--rm`.
    #[serde(default)]
    pub auto_remove: bool,
}

fn default_oci_version() -> String {
    "1.2.0".to_string()
}

/// Container status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container is being created.
    Creating,
    /// Container has been created but not started.
    Created,
    /// Container is running.
    Running,
    /// Container has exited.
    Stopped,
    /// Container is paused.
    Paused,
}

impl ContainerStatus {
    /// Returns true if the container is in a running state.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true if the container has exited or never started.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped | Self::Created)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl ContainerState {
    /// Create a new container state in the "created" status.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            oci_version: default_oci_version(),
            id: id.into(),
            status: ContainerStatus::Created,
            pid: None,
            bundle: PathBuf::new(),
            labels: HashMap::new(),
            auto_remove: false,
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Transition to the "running" status.
    pub fn set_running(&mut self, pid: u32) {
        self.status = ContainerStatus::Running;
        self.pid = Some(pid);
    }

    /// Transition to the "stopped" status.
    pub fn set_stopped(&mut self) {
        self.status = ContainerStatus::Stopped;
        self.pid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions() {
        let mut state = ContainerState::new("test-container");
        assert_eq!(state.status, ContainerStatus::Created);
        assert!(state.status.is_stopped());

        state.set_running(12345);
        assert!(state.status.is_running());
        assert_eq!(state.pid, Some(12345));

        state.set_stopped();
        assert!(state.status.is_stopped());
        assert!(state.pid.is_none());
    }

    #[test]
    fn state_serialization() {
        let state = ContainerState::new("web").with_label("cask/anonymous-volumes", "[]");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"status\":\"created\""));
        assert!(json.contains("\"autoRemove\":false"));

        let parsed: ContainerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.labels["cask/anonymous-volumes"], "[]");
    }

    #[test]
    fn minimal_state_parses() {
        let parsed: ContainerState =
            serde_json::from_str(r#"{"id":"c1","status":"running"}"#).unwrap();
        assert_eq!(parsed.oci_version, "1.2.0");
        assert!(parsed.labels.is_empty());
        assert!(!parsed.auto_remove);
    }

    #[test]
    fn status_display() {
        assert_eq!(ContainerStatus::Created.to_string(), "created");
        assert_eq!(ContainerStatus::Running.to_string(), "running");
        assert_eq!(ContainerStatus::Stopped.to_string(), "stopped");
    }
}
