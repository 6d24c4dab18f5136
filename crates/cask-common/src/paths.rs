//! Standard filesystem paths for Cask.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default root directory for Cask data.
///
/// `CASK_ROOT` wins; otherwise `/var/lib/cask` for root and the user's data
/// directory for rootless use.
pub static CASK_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("CASK_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_root())
});

fn default_root() -> PathBuf {
    if rustix::process::geteuid().is_root() {
        return PathBuf::from("/var/lib/cask");
    }
    dirs::data_local_dir().map_or_else(|| PathBuf::from("/var/lib/cask"), |dir| dir.join("cask"))
}

/// Standard paths used by Cask.
#[derive(Debug, Clone)]
pub struct CaskPaths {
    /// Root data directory (default: /var/lib/cask).
    pub root: PathBuf,
}

impl CaskPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every volume namespace.
    #[must_use]
    pub fn volumes(&self) -> PathBuf {
        self.root.join("volumes")
    }

    /// Volume store directory for one namespace.
    #[must_use]
    pub fn volume_namespace(&self, namespace: &str) -> PathBuf {
        self.volumes().join(namespace)
    }

    /// Directory holding container state for one namespace.
    #[must_use]
    pub fn containers(&self, namespace: &str) -> PathBuf {
        self.root.join("containers").join(namespace)
    }

    /// Directory for a specific container.
    #[must_use]
    pub fn container(&self, namespace: &str, id: &str) -> PathBuf {
        self.containers(namespace).join(id)
    }

    /// Container state file.
    #[must_use]
    pub fn container_state(&self, namespace: &str, id: &str) -> PathBuf {
        self.container(namespace, id).join("state.json")
    }
}

impl Default for CaskPaths {
    fn default() -> Self {
        Self {
            root: CASK_ROOT.clone(),
        }
    }
}
