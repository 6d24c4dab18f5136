//! Resolved mounts.

use std::collections::HashMap;
use std::fmt;

use cask_common::CaskResult;
use cask_oci::{Mount, Spec};
use cask_volume::MountPoint;
use cask_volume::usage::{ANONYMOUS_VOLUMES_LABEL, MOUNTS_LABEL};

use crate::propagation::{Propagation, SpecMutation};

/// What a mount exposes inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// A host path.
    Bind,
    /// A named or anonymous volume from the store.
    Volume,
    /// A memory-backed filesystem.
    Tmpfs,
}

impl MountKind {
    /// Lowercase name, as recorded in container labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "bind",
            Self::Volume => "volume",
            Self::Tmpfs => "tmpfs",
        }
    }
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed and resolved mount argument.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Mount kind.
    pub kind: MountKind,
    /// The OCI mount entry.
    pub mount: Mount,
    /// Volume name, for volume mounts.
    pub name: Option<String>,
    /// Set when the volume was created for this mount and belongs to the
    /// container.
    pub anonymous_volume: Option<String>,
    /// The user's option string.
    pub mode: String,
    /// Propagation of bind and volume mounts.
    pub propagation: Option<Propagation>,
    /// Changes this mount requires on the container spec.
    pub mutations: Vec<SpecMutation>,
}

impl Processed {
    /// Returns true if the mount is read-only.
    #[must_use]
    pub fn readonly(&self) -> bool {
        self.mount.options.iter().any(|option| option == "ro")
    }

    /// The record stored in the container's mounts label.
    #[must_use]
    pub fn mount_point(&self) -> MountPoint {
        MountPoint {
            mount_type: self.kind.as_str().to_string(),
            name: self.name.clone().unwrap_or_default(),
            source: self
                .mount
                .source
                .as_ref()
                .map(|source| source.display().to_string())
                .unwrap_or_default(),
            destination: self.mount.destination.display().to_string(),
            mode: self.mode.clone(),
            rw: !self.readonly(),
            propagation: self
                .propagation
                .map(|propagation| propagation.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    /// Add the mount to `spec` and apply its mutations.
    pub fn apply(&self, spec: &mut Spec) {
        spec.mounts.push(self.mount.clone());
        for mutation in &self.mutations {
            mutation.apply(spec);
        }
    }
}

/// Container labels recording which volumes `mounts` reference.
///
/// # Errors
///
/// Returns a serialization error if encoding fails.
pub fn encode_mount_labels(mounts: &[Processed]) -> CaskResult<HashMap<String, String>> {
    let points: Vec<MountPoint> = mounts.iter().map(Processed::mount_point).collect();
    let anonymous: Vec<&str> = mounts
        .iter()
        .filter_map(|mount| mount.anonymous_volume.as_deref())
        .collect();

    Ok(HashMap::from([
        (MOUNTS_LABEL.to_string(), serde_json::to_string(&points)?),
        (
            ANONYMOUS_VOLUMES_LABEL.to_string(),
            serde_json::to_string(&anonymous)?,
        ),
    ]))
}
