//! Volume operations that combine the store with container usage.
//!
//! Every decision that depends on which volumes are in use is taken inside
//! the store's critical section, so a container created concurrently through
//! the same store lock cannot have its volume deleted underneath it.

use cask_common::{CaskError, CaskResult};
use cask_oci::ContainerState;

use crate::filter::FilterSet;
use crate::store::{RemoveReport, Volume, VolumeStore};
use crate::usage::{self, ContainerSource, UsageReport};

/// Volume store plus the containers that may reference its volumes.
pub struct VolumeService<C> {
    store: VolumeStore,
    containers: C,
}

impl<C: ContainerSource> VolumeService<C> {
    /// Create a service over `store` and `containers`.
    pub const fn new(store: VolumeStore, containers: C) -> Self {
        Self { store, containers }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &VolumeStore {
        &self.store
    }

    /// Current usage computed from the container source.
    ///
    /// # Errors
    ///
    /// Returns an error if the container list cannot be obtained.
    pub fn usage(&self) -> CaskResult<UsageReport> {
        Ok(usage::analyze(&self.containers.containers()?))
    }

    /// Create a volume (see [`VolumeStore::create`]).
    ///
    /// # Errors
    ///
    /// Returns an error for malformed names or labels, or a storage error.
    pub fn create(&self, name: Option<&str>, labels: &[String]) -> CaskResult<Volume> {
        self.store.create(name, labels)
    }

    /// Look up several volumes, collecting per-name failures.
    pub fn inspect(&self, names: &[String], size: bool) -> (Vec<Volume>, Vec<CaskError>) {
        let mut found = Vec::new();
        let mut errors = Vec::new();
        for name in names {
            match self.store.get(name, size) {
                Ok(volume) => found.push(volume),
                Err(err) => errors.push(err),
            }
        }
        (found, errors)
    }

    /// Volumes passing `filters`, sorted by name.
    ///
    /// Sizes are computed when requested or when a size filter needs them.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be listed.
    pub fn list(&self, filters: &FilterSet, size: bool) -> CaskResult<Vec<Volume>> {
        if filters.needs_size() && !size {
            tracing::warn!("Size filter given without --size, computing sizes anyway");
        }
        let mut volumes: Vec<Volume> = self
            .store
            .list(size || filters.needs_size())?
            .into_values()
            .filter(|volume| filters.matches(volume))
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(volumes)
    }

    /// Remove the named volumes unless a container references them.
    ///
    /// In-use, missing and malformed names become warnings; with `force`,
    /// missing names are silently skipped. The in-use check is never bypassed.
    pub fn remove(&self, names: &[String], force: bool) -> RemoveReport {
        let mut report = self.store.remove(|| {
            let usage = self.usage()?;
            let mut targets = Vec::new();
            let mut warnings = Vec::new();
            for name in names {
                if usage.is_used(name) {
                    warnings.push(CaskError::VolumeInUse { name: name.clone() });
                } else {
                    targets.push(name.clone());
                }
            }
            Ok((targets, warnings))
        });

        if force {
            report.warnings.retain(|warning| !warning.is_not_found());
        }
        report
    }

    /// Delete unused volumes passing `filters`.
    ///
    /// Without `all`, only anonymous volumes are candidates.
    ///
    /// # Errors
    ///
    /// Returns an error if the container list cannot be obtained or a
    /// deletion fails.
    pub fn prune(&self, all: bool, filters: &FilterSet) -> CaskResult<Vec<String>> {
        let mut removed = self.store.prune(filters.needs_size(), |volumes| {
            let usage = self.usage()?;
            for name in &usage.held_by_stopped {
                tracing::debug!(name, "Keeping volume referenced by a stopped container");
            }
            Ok(volumes
                .into_iter()
                .filter(|volume| all || volume.is_anonymous())
                .filter(|volume| !usage.is_used(&volume.name))
                .filter(|volume| filters.matches(volume))
                .map(|volume| volume.name)
                .collect())
        })?;
        removed.sort();
        Ok(removed)
    }

    /// Delete the anonymous volumes owned by a container that is being removed.
    ///
    /// Runs when the container was created with auto-remove or when
    /// `remove_anonymous` is set (`rm -v`). Volumes still referenced by any
    /// other container are kept.
    pub fn release_container(&self, container: &ContainerState, remove_anonymous: bool) -> RemoveReport {
        if !(remove_anonymous || container.auto_remove) {
            return RemoveReport::default();
        }

        let owned = match usage::anonymous_volumes(&container.labels) {
            Ok(owned) => owned,
            Err(err) => {
                tracing::warn!(container = %container.id, %err, "Cannot read anonymous volumes of container");
                return RemoveReport::default();
            }
        };
        if owned.is_empty() {
            return RemoveReport::default();
        }

        self.store.remove(|| {
            let others: Vec<ContainerState> = self
                .containers
                .containers()?
                .into_iter()
                .filter(|other| other.id != container.id)
                .collect();
            let usage = usage::analyze(&others);

            let mut targets = Vec::new();
            let mut warnings = Vec::new();
            for name in owned {
                if usage.is_used(&name) {
                    warnings.push(CaskError::VolumeInUse { name });
                } else {
                    targets.push(name);
                }
            }
            Ok((targets, warnings))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{ANONYMOUS_VOLUMES_LABEL, MOUNTS_LABEL};
    use cask_common::{CaskPaths, ErrorKind};
    use cask_oci::ContainerStatus;
    use tempfile::{TempDir, tempdir};

    fn holder(id: &str, named: &[&str], anonymous: &[&str]) -> ContainerState {
        let mounts: Vec<String> = named
            .iter()
            .chain(anonymous)
            .map(|name| format!(r#"{{"Type":"volume","Name":"{name}","Destination":"/{name}"}}"#))
            .collect();
        let anonymous: Vec<String> = anonymous.iter().map(|name| format!("\"{name}\"")).collect();
        let mut state = ContainerState::new(id)
            .with_label(MOUNTS_LABEL, format!("[{}]", mounts.join(",")))
            .with_label(ANONYMOUS_VOLUMES_LABEL, format!("[{}]", anonymous.join(",")));
        state.set_running(42);
        state
    }

    fn service(containers: Vec<ContainerState>) -> (TempDir, VolumeService<Vec<ContainerState>>) {
        let temp = tempdir().unwrap();
        let store = VolumeStore::open(&CaskPaths::with_root(temp.path()), "default").unwrap();
        (temp, VolumeService::new(store, containers))
    }

    #[test]
    fn busy_volume_is_not_removed() {
        let (_temp, svc) = service(vec![holder("c1", &["V"], &[])]);
        svc.create(Some("V"), &[]).unwrap();

        let report = svc.remove(&["V".to_string()], false);
        assert!(report.removed.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), ErrorKind::FailedPrecondition);
        assert!(report.warnings[0].to_string().contains("in use"));
        assert!(svc.store().exists("V").unwrap());
    }

    #[test]
    fn idle_volume_is_removed() {
        let (_temp, svc) = service(Vec::new());
        svc.create(Some("V"), &[]).unwrap();

        let report = svc.remove(&["V".to_string(), "ghost".to_string()], false);
        assert_eq!(report.removed, vec!["V"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].is_not_found());
        assert!(!svc.store().exists("V").unwrap());
    }

    #[test]
    fn force_skips_missing_names_only() {
        let (_temp, svc) = service(vec![holder("c1", &["busy"], &[])]);
        svc.create(Some("busy"), &[]).unwrap();

        let report = svc.remove(&["ghost".to_string(), "busy".to_string()], true);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn prune_scope() {
        let (_temp, svc) = service(Vec::new());
        svc.create(Some("A"), &[]).unwrap();
        svc.create(Some("B"), &[]).unwrap();
        let x = svc.create(None, &[]).unwrap().name;
        let y = svc.create(None, &[]).unwrap().name;

        let svc = VolumeService::new(svc.store, vec![holder("c1", &["A"], &[x.as_str()])]);

        let removed = svc.prune(false, &FilterSet::default()).unwrap();
        assert_eq!(removed, vec![y.clone()]);

        let removed = svc.prune(true, &FilterSet::default()).unwrap();
        assert_eq!(removed, vec!["B".to_string()]);

        let mut left: Vec<String> = svc.store().list(false).unwrap().into_keys().collect();
        left.sort();
        let mut expected = vec!["A".to_string(), x];
        expected.sort();
        assert_eq!(left, expected);
    }

    #[test]
    fn prune_keeps_volumes_of_stopped_containers() {
        let (_temp, svc) = service(Vec::new());
        let anon = svc.create(None, &[]).unwrap().name;
        let mut stopped = holder("c1", &[], &[anon.as_str()]);
        stopped.status = ContainerStatus::Stopped;

        let svc = VolumeService::new(svc.store, vec![stopped]);
        assert!(svc.prune(true, &FilterSet::default()).unwrap().is_empty());
        assert!(svc.store().exists(&anon).unwrap());
    }

    #[test]
    fn prune_honors_label_filter() {
        let (_temp, svc) = service(Vec::new());
        svc.create(Some("keep"), &["tier=web".into()]).unwrap();
        svc.create(Some("drop"), &["tier=db".into()]).unwrap();

        let filters = FilterSet::parse(&["label=tier=db"]).unwrap();
        assert_eq!(svc.prune(true, &filters).unwrap(), vec!["drop"]);
    }

    #[test]
    fn list_filters_by_size() {
        let (_temp, svc) = service(Vec::new());
        for (name, bytes) in [("V1", 100 * 1024), ("V2", 200 * 1024), ("V3", 0)] {
            let volume = svc.create(Some(name), &[]).unwrap();
            if bytes > 0 {
                std::fs::write(volume.mountpoint.join("blob"), vec![0u8; bytes]).unwrap();
            }
        }

        let filters = FilterSet::parse(&["size>=204800"]).unwrap();
        let names: Vec<String> = svc
            .list(&filters, true)
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["V2"]);
    }

    #[test]
    fn inspect_collects_failures() {
        let (_temp, svc) = service(Vec::new());
        svc.create(Some("V"), &[]).unwrap();

        let (found, errors) = svc.inspect(&["V".into(), "missing".into(), "b@d".into()], false);
        assert_eq!(found.len(), 1);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn release_container_removes_owned_anonymous_volumes() {
        let (_temp, svc) = service(Vec::new());
        let owned = svc.create(None, &[]).unwrap().name;
        let shared = svc.create(None, &[]).unwrap().name;

        let mut leaving = holder("leaving", &[], &[owned.as_str(), shared.as_str()]);
        leaving.set_stopped();
        let other = holder("other", &[], &[shared.as_str()]);
        let svc = VolumeService::new(svc.store, vec![leaving.clone(), other]);

        let report = svc.release_container(&leaving, false);
        assert!(report.removed.is_empty());
        assert!(svc.store().exists(&owned).unwrap());

        let report = svc.release_container(&leaving, true);
        assert_eq!(report.removed, vec![owned.clone()]);
        assert_eq!(report.warnings.len(), 1);
        assert!(!svc.store().exists(&owned).unwrap());
        assert!(svc.store().exists(&shared).unwrap());
    }
}
