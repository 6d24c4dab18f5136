//! Volume usage analysis.
//!
//! Containers record the volumes they reference in two labels written at
//! creation time. Intersecting those labels across all containers yields the
//! set of volumes that must not be removed.

use std::collections::{HashMap, HashSet};

use cask_common::{CaskError, CaskResult};
use cask_oci::ContainerState;
use serde::{Deserialize, Serialize};

/// Container label holding a JSON array of [`MountPoint`] objects.
pub const MOUNTS_LABEL: &str = "cask/mounts";

/// Container label holding a JSON array of anonymous volume names.
pub const ANONYMOUS_VOLUMES_LABEL: &str = "cask/anonymous-volumes";

/// One mount of a container, as recorded in [`MOUNTS_LABEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountPoint {
    /// Mount type: `bind`, `volume` or `tmpfs`.
    #[serde(rename = "Type")]
    pub mount_type: String,
    /// Volume name, for volume mounts.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Host source path.
    #[serde(default)]
    pub source: String,
    /// Container destination path.
    pub destination: String,
    /// Raw user options.
    #[serde(default)]
    pub mode: String,
    /// Whether the mount is writable.
    #[serde(rename = "RW", default)]
    pub rw: bool,
    /// Propagation mode.
    #[serde(default)]
    pub propagation: String,
}

/// Supplies the containers whose labels are analyzed.
pub trait ContainerSource {
    /// Every container that currently exists, running or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the container list cannot be obtained at all.
    fn containers(&self) -> CaskResult<Vec<ContainerState>>;
}

impl ContainerSource for Vec<ContainerState> {
    fn containers(&self) -> CaskResult<Vec<ContainerState>> {
        Ok(self.clone())
    }
}

/// Volumes referenced by containers.
#[derive(Debug, Default, Clone)]
pub struct UsageReport {
    /// Names referenced by a `volume` mount.
    pub volumes: HashSet<String>,
    /// Anonymous volume names owned by some container.
    pub anonymous: HashSet<String>,
    /// Names referenced only by stopped containers.
    pub held_by_stopped: HashSet<String>,
}

impl UsageReport {
    /// Returns true if any container references `name`.
    #[must_use]
    pub fn is_used(&self, name: &str) -> bool {
        self.volumes.contains(name) || self.anonymous.contains(name)
    }
}

/// Volume references decoded from one container's labels.
#[derive(Debug, Default)]
struct ContainerVolumes {
    named: Vec<String>,
    anonymous: Vec<String>,
}

fn decode(labels: &HashMap<String, String>) -> CaskResult<ContainerVolumes> {
    let mut decoded = ContainerVolumes::default();

    if let Some(raw) = labels.get(MOUNTS_LABEL) {
        let mounts: Vec<MountPoint> = serde_json::from_str(raw)?;
        decoded.named = mounts
            .into_iter()
            .filter(|mount| mount.mount_type == "volume" && !mount.name.is_empty())
            .map(|mount| mount.name)
            .collect();
    }
    decoded.anonymous = anonymous_volumes(labels)?;
    Ok(decoded)
}

/// Anonymous volume names recorded on a container.
///
/// # Errors
///
/// Returns a serialization error if the label is not a JSON string array.
pub fn anonymous_volumes(labels: &HashMap<String, String>) -> CaskResult<Vec<String>> {
    match labels.get(ANONYMOUS_VOLUMES_LABEL) {
        Some(raw) => serde_json::from_str(raw).map_err(CaskError::from),
        None => Ok(Vec::new()),
    }
}

/// Compute which volumes are referenced by `containers`.
///
/// Running and stopped containers both hold their volumes. A container with
/// malformed labels is logged and contributes nothing.
pub fn analyze<'a>(containers: impl IntoIterator<Item = &'a ContainerState>) -> UsageReport {
    let mut report = UsageReport::default();
    let mut held_by_live = HashSet::new();

    for container in containers {
        let decoded = match decode(&container.labels) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(container = %container.id, %err, "Ignoring container with unreadable volume labels");
                continue;
            }
        };

        let stopped = !container.status.is_running();
        for name in decoded.named.iter().chain(&decoded.anonymous) {
            if stopped {
                report.held_by_stopped.insert(name.clone());
            } else {
                held_by_live.insert(name.clone());
            }
        }
        report.volumes.extend(decoded.named);
        report.anonymous.extend(decoded.anonymous);
    }

    report.held_by_stopped.retain(|name| !held_by_live.contains(name));
    report
}
