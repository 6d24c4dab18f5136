//! Volume store.
//!
//! Typed layer over [`FsStore`]: one entry per volume holding a `_data`
//! directory (the mount-point) and a `volume.json` metadata file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cask_common::id::{self, VolumeName};
use cask_common::{CaskError, CaskPaths, CaskResult, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fsstore::{FsStore, LockGuard};

/// Directory inside a volume entry that is exposed to containers.
pub const DATA_DIR: &str = "_data";

/// Metadata file inside a volume entry.
pub const METADATA_FILE: &str = "volume.json";

/// Label carried by volumes the system named on the user's behalf.
pub const ANONYMOUS_LABEL: &str = "cask/anonymous-volume";

/// A stored volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    /// Volume name.
    pub name: String,
    /// Absolute host path of the `_data` directory.
    pub mountpoint: PathBuf,
    /// When the volume directory was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Volume labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Disk usage of the data directory in bytes, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Volume {
    /// Returns true if the volume was created without a user-chosen name.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.labels.contains_key(ANONYMOUS_LABEL)
    }
}

/// On-disk content of `volume.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct VolumeMetadata {
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Outcome of [`VolumeStore::remove`].
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// Names that were deleted.
    pub removed: Vec<String>,
    /// Per-item problems that did not stop the batch.
    pub warnings: Vec<CaskError>,
    /// Error that stopped the batch, if any.
    pub fatal: Option<CaskError>,
}

impl RemoveReport {
    /// Returns true if every requested volume was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.fatal.is_none()
    }
}

/// Volume store for one namespace.
#[derive(Debug)]
pub struct VolumeStore {
    fs: FsStore,
    namespace: String,
}

impl VolumeStore {
    /// Open the store for `namespace` under the given data root.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is malformed or the directory cannot
    /// be created.
    pub fn open(paths: &CaskPaths, namespace: &str) -> CaskResult<Self> {
        id::validate(namespace).map_err(|_| {
            CaskError::invalid_argument(format!("invalid namespace {namespace:?}"))
        })?;

        let fs = FsStore::open(paths.volume_namespace(namespace))?;
        tracing::debug!(namespace, dir = %fs.dir().display(), "Opened volume store");
        Ok(Self {
            fs,
            namespace: namespace.to_string(),
        })
    }

    /// The namespace this store serves.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The namespace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.fs.dir()
    }

    /// Acquire the store lock for a multi-step critical section.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidState`] if the calling thread already
    /// holds it.
    pub fn lock(&self) -> CaskResult<()> {
        self.fs.lock()
    }

    /// Acquire the store lock, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`FsStore::lock_timeout`].
    pub fn lock_timeout(&self, timeout: Duration) -> CaskResult<()> {
        self.fs.lock_timeout(timeout)
    }

    /// Release the store lock.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidState`] if the calling thread does not
    /// hold it.
    pub fn unlock(&self) -> CaskResult<()> {
        self.fs.unlock()
    }

    /// Acquire the store lock as a guard.
    ///
    /// # Errors
    ///
    /// See [`FsStore::lock`].
    pub fn guard(&self) -> CaskResult<LockGuard<'_>> {
        self.fs.guard()
    }

    /// Acquire the store lock as a guard, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`FsStore::lock_timeout`].
    pub fn guard_timeout(&self, timeout: Duration) -> CaskResult<LockGuard<'_>> {
        self.fs.guard_timeout(timeout)
    }

    /// Run `f` with the store lock held.
    ///
    /// # Errors
    ///
    /// Returns the locking error, or whatever `f` returns.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> CaskResult<T>) -> CaskResult<T> {
        self.fs.with_lock(f)
    }

    /// Returns true if the calling thread holds the store lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.fs.is_locked()
    }

    /// Create a volume, or return the existing one with the same name.
    ///
    /// `name` of `None` creates an anonymous volume. Labels are `k=v` strings;
    /// a bare `k` means an empty value. When the volume already exists the
    /// supplied labels are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidVolumeName`] or
    /// [`CaskError::InvalidArgument`] for malformed input, or a storage error.
    pub fn create(&self, name: Option<&str>, labels: &[String]) -> CaskResult<Volume> {
        self.fs.auto_lock(|| self.create_locked(name, labels))
    }

    /// Like [`VolumeStore::create`], for callers that already hold the lock.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidState`] if the lock is not held, otherwise
    /// the same errors as [`VolumeStore::create`].
    pub fn create_without_lock(&self, name: Option<&str>, labels: &[String]) -> CaskResult<Volume> {
        if !self.fs.is_locked() {
            return Err(CaskError::invalid_state(
                "create_without_lock called without holding the store lock",
            ));
        }
        self.create_locked(name, labels)
    }

    fn create_locked(&self, name: Option<&str>, labels: &[String]) -> CaskResult<Volume> {
        let mut labels = parse_labels(labels)?;
        let name = match name {
            Some(name) => VolumeName::new(name)?,
            None => {
                labels.insert(ANONYMOUS_LABEL.to_string(), String::new());
                VolumeName::generate_anonymous()
            }
        };
        let name = name.as_str();

        let repairing = if self.fs.exists(name, &[DATA_DIR])? {
            match self.read_volume(name, false) {
                Ok(volume) => {
                    tracing::warn!(name, "Volume already exists, ignoring supplied labels");
                    return Ok(volume);
                }
                Err(CaskError::Serialization(err)) => {
                    tracing::warn!(name, %err, "Rewriting unreadable volume metadata, keeping its data");
                    true
                }
                Err(err) => return Err(err),
            }
        } else {
            if self.fs.exists(name, &[])? {
                tracing::debug!(name, "Removing incomplete volume directory");
                self.fs.delete(name)?;
            }
            false
        };

        self.fs.group_ensure(name, DATA_DIR)?;
        let metadata = VolumeMetadata {
            labels: Some(labels),
        };
        let written = serde_json::to_vec(&metadata)
            .map_err(CaskError::from)
            .and_then(|bytes| self.fs.set(&bytes, name, METADATA_FILE));
        if let Err(err) = written {
            if repairing {
                return Err(err);
            }
            if let Err(cleanup) = self.fs.delete(name) {
                tracing::warn!(name, %cleanup, "Failed to clean up partially created volume");
            }
            return Err(err);
        }

        tracing::info!(name, namespace = %self.namespace, "Volume created");
        self.read_volume(name, false)
    }

    /// Returns true if a volume with this name exists.
    ///
    /// A volume exists when its `_data` directory is present and its
    /// metadata parses, which is exactly when [`VolumeStore::get`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidVolumeName`] for malformed names, or a
    /// storage error other than unreadable metadata.
    pub fn exists(&self, name: &str) -> CaskResult<bool> {
        id::validate(name)?;
        self.fs.auto_lock(|| {
            if !self.fs.exists(name, &[DATA_DIR])? {
                return Ok(false);
            }
            match self.read_volume(name, false) {
                Ok(_) => Ok(true),
                Err(CaskError::Serialization(_)) => Ok(false),
                Err(err) => Err(err),
            }
        })
    }

    /// Look up one volume, optionally computing its size.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::VolumeNotFound`] if absent,
    /// [`CaskError::InvalidVolumeName`] for malformed names, or a storage
    /// error if the metadata cannot be read.
    pub fn get(&self, name: &str, size: bool) -> CaskResult<Volume> {
        id::validate(name)?;
        self.fs.auto_lock(|| {
            if !self.fs.exists(name, &[DATA_DIR])? {
                return Err(CaskError::VolumeNotFound {
                    name: name.to_string(),
                });
            }
            self.read_volume(name, size)
        })
    }

    /// All volumes keyed by name.
    ///
    /// Entries whose metadata cannot be parsed are skipped with a warning, so
    /// the result is exactly the set of names [`VolumeStore::get`] accepts.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be enumerated.
    pub fn list(&self, size: bool) -> CaskResult<HashMap<String, Volume>> {
        self.fs.auto_lock(|| {
            let mut volumes = HashMap::new();
            for name in self.fs.list()? {
                if id::validate(&name).is_err() || !self.fs.exists(&name, &[DATA_DIR])? {
                    tracing::debug!(name, "Skipping foreign store entry");
                    continue;
                }
                match self.read_volume(&name, size) {
                    Ok(volume) => {
                        volumes.insert(name, volume);
                    }
                    Err(CaskError::Serialization(err)) => {
                        tracing::warn!(name, %err, "Skipping volume with unreadable metadata");
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(volumes)
        })
    }

    /// Remove the volumes named by `generator`.
    ///
    /// The generator runs inside the critical section and returns the target
    /// names plus warnings it already collected, so callers can compute an
    /// in-use set that cannot change before deletion. Malformed and missing
    /// names become warnings; a filesystem failure stops the batch and is
    /// reported in [`RemoveReport::fatal`].
    pub fn remove<F>(&self, generator: F) -> RemoveReport
    where
        F: FnOnce() -> CaskResult<(Vec<String>, Vec<CaskError>)>,
    {
        let mut report = RemoveReport::default();
        let outcome = self.fs.auto_lock(|| {
            let (names, warnings) = generator()?;
            report.warnings = warnings;

            for name in names {
                if let Err(err) = id::validate(&name) {
                    report.warnings.push(err);
                    continue;
                }
                if !self.fs.exists(&name, &[])? {
                    report.warnings.push(CaskError::VolumeNotFound { name });
                    continue;
                }
                self.fs.delete(&name)?;
                tracing::info!(name, namespace = %self.namespace, "Volume removed");
                report.removed.push(name);
            }
            Ok(())
        });

        if let Err(err) = outcome {
            report.fatal = Some(err);
        }
        report
    }

    /// Delete every volume selected by `filter`.
    ///
    /// The filter receives the full volume list (with sizes when `size` is
    /// set) inside the critical section and returns the names to delete.
    ///
    /// # Errors
    ///
    /// Returns the filter's error or a storage error; volumes deleted before
    /// a storage error stay deleted.
    pub fn prune<F>(&self, size: bool, filter: F) -> CaskResult<Vec<String>>
    where
        F: FnOnce(Vec<Volume>) -> CaskResult<Vec<String>>,
    {
        self.fs.auto_lock(|| {
            let volumes = self.list(size)?.into_values().collect();
            let mut removed = Vec::new();
            for name in filter(volumes)? {
                id::validate(&name)?;
                self.fs.delete(&name)?;
                tracing::info!(name, namespace = %self.namespace, "Volume pruned");
                removed.push(name);
            }
            Ok(removed)
        })
    }

    /// Number of volumes in the store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be enumerated.
    pub fn count(&self) -> CaskResult<usize> {
        Ok(self.list(false)?.len())
    }

    fn read_volume(&self, name: &str, size: bool) -> CaskResult<Volume> {
        let metadata = match self.fs.get(name, METADATA_FILE) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => VolumeMetadata::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => VolumeMetadata::default(),
            Err(err) => return Err(err),
        };

        let mountpoint = self.fs.location(name, DATA_DIR)?;
        let created_at = std::fs::metadata(self.fs.dir().join(name))
            .and_then(|meta| meta.created().or_else(|_| meta.modified()))
            .ok()
            .map(DateTime::<Utc>::from);
        let size = if size {
            Some(self.fs.group_size(name, DATA_DIR)?)
        } else {
            None
        };

        Ok(Volume {
            name: name.to_string(),
            mountpoint,
            created_at,
            labels: metadata.labels.unwrap_or_default(),
            size,
        })
    }
}

/// Parse `k=v` label strings into a map.
///
/// # Errors
///
/// Returns [`CaskError::InvalidArgument`] for an empty string or empty key.
pub fn parse_labels(labels: &[String]) -> CaskResult<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for label in labels {
        if label.is_empty() {
            return Err(CaskError::invalid_argument("label must not be empty"));
        }
        let (key, value) = label.split_once('=').unwrap_or((label.as_str(), ""));
        if key.is_empty() {
            return Err(CaskError::invalid_argument(format!(
                "label {label:?} has an empty key"
            )));
        }
        parsed.insert(key.to_string(), value.to_string());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn open_store() -> (TempDir, VolumeStore) {
        let temp = tempdir().unwrap();
        let store = VolumeStore::open(&CaskPaths::with_root(temp.path()), "default").unwrap();
        (temp, store)
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn create_writes_bit_exact_layout() {
        let (temp, store) = open_store();
        let volume = store.create(Some("data"), &labels(&["tier=db"])).unwrap();

        let dir = temp.path().join("volumes/default/data");
        assert!(dir.join("_data").is_dir());
        assert_eq!(volume.mountpoint, dir.join("_data"));

        let json = std::fs::read_to_string(dir.join("volume.json")).unwrap();
        assert_eq!(json, r#"{"labels":{"tier":"db"}}"#);
    }

    #[test]
    fn create_then_get_roundtrips_labels() {
        let (_temp, store) = open_store();
        store
            .create(Some("data"), &labels(&["a=1", "b", "c=x=y"]))
            .unwrap();

        let volume = store.get("data", false).unwrap();
        assert_eq!(volume.name, "data");
        assert_eq!(volume.labels["a"], "1");
        assert_eq!(volume.labels["b"], "");
        assert_eq!(volume.labels["c"], "x=y");
        assert!(volume.size.is_none());
        assert!(!volume.is_anonymous());
    }

    #[test_log::test]
    fn duplicate_create_keeps_original_labels() {
        let (_temp, store) = open_store();
        store.create(Some("data"), &labels(&["a=1"])).unwrap();
        let again = store.create(Some("data"), &labels(&["a=2", "b=3"])).unwrap();

        assert_eq!(again.labels.len(), 1);
        assert_eq!(again.labels["a"], "1");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn anonymous_create() {
        let (_temp, store) = open_store();
        let volume = store.create(None, &[]).unwrap();

        assert_eq!(volume.name.len(), 64);
        assert!(VolumeName::new(volume.name.clone()).unwrap().looks_anonymous());
        assert!(volume.is_anonymous());
    }

    #[test]
    fn create_rejects_bad_input() {
        let (_temp, store) = open_store();
        for bad in ["", "-x", "a/b", "../x"] {
            let err = store.create(Some(bad), &[]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad:?}");
        }
        assert!(store.create(Some("ok"), &labels(&[""])).is_err());
        assert!(store.create(Some("ok"), &labels(&["=v"])).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn create_without_lock_requires_lock() {
        let (_temp, store) = open_store();
        let err = store.create_without_lock(Some("data"), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let volume = store
            .with_lock(|| store.create_without_lock(Some("data"), &[]))
            .unwrap();
        assert_eq!(volume.name, "data");
    }

    #[test]
    fn get_missing_and_invalid() {
        let (_temp, store) = open_store();
        assert!(matches!(
            store.get("nope", false),
            Err(CaskError::VolumeNotFound { .. })
        ));
        assert_eq!(
            store.get("bad/name", false).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(!store.exists("nope").unwrap());
        assert!(store.exists("-bad").is_err());
    }

    #[test]
    fn metadata_tolerates_missing_labels() {
        let (temp, store) = open_store();
        let dir = temp.path().join("volumes/default");
        for (name, content) in [("empty-object", Some("{}")), ("null", Some(r#"{"labels":null}"#)), ("absent", None)] {
            std::fs::create_dir_all(dir.join(name).join("_data")).unwrap();
            if let Some(content) = content {
                std::fs::write(dir.join(name).join("volume.json"), content).unwrap();
            }
        }

        for name in ["empty-object", "null", "absent"] {
            assert!(store.get(name, false).unwrap().labels.is_empty(), "{name}");
        }
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test_log::test]
    fn list_matches_get() {
        let (temp, store) = open_store();
        store.create(Some("good"), &[]).unwrap();
        let broken = temp.path().join("volumes/default/broken");
        std::fs::create_dir_all(broken.join("_data")).unwrap();
        std::fs::write(broken.join("volume.json"), "{not json").unwrap();

        let volumes = store.list(false).unwrap();
        assert_eq!(volumes.len(), 1);
        assert!(volumes.contains_key("good"));
        assert!(store.get("broken", false).is_err());

        for name in ["good", "broken", "missing"] {
            assert_eq!(
                store.exists(name).unwrap(),
                volumes.contains_key(name),
                "{name}"
            );
        }
    }

    #[test_log::test]
    fn create_rewrites_unreadable_metadata() {
        let (temp, store) = open_store();
        let broken = temp.path().join("volumes/default/broken");
        std::fs::create_dir_all(broken.join("_data")).unwrap();
        std::fs::write(broken.join("_data/keep.txt"), b"payload").unwrap();
        std::fs::write(broken.join("volume.json"), "{not json").unwrap();

        let volume = store.create(Some("broken"), &labels(&["tier=db"])).unwrap();
        assert_eq!(volume.labels["tier"], "db");
        assert!(store.exists("broken").unwrap());
        assert_eq!(
            std::fs::read(broken.join("_data/keep.txt")).unwrap(),
            b"payload"
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn created_at_is_recorded() {
        let (_temp, store) = open_store();
        let before = Utc::now() - chrono::Duration::seconds(5);
        let volume = store.create(Some("data"), &[]).unwrap();

        let created_at = volume.created_at.unwrap();
        assert!(created_at >= before);
        assert!(created_at <= Utc::now() + chrono::Duration::seconds(5));
    }

    #[test]
    fn get_with_size() {
        let (_temp, store) = open_store();
        let volume = store.create(Some("data"), &[]).unwrap();
        std::fs::write(volume.mountpoint.join("blob"), vec![1u8; 4096]).unwrap();

        assert_eq!(store.get("data", true).unwrap().size, Some(4096));
        assert_eq!(store.list(true).unwrap()["data"].size, Some(4096));
    }

    #[test]
    fn remove_reports_per_item_warnings() {
        let (_temp, store) = open_store();
        store.create(Some("a"), &[]).unwrap();
        store.create(Some("b"), &[]).unwrap();

        let report = store.remove(|| {
            Ok((
                vec!["a".into(), "missing".into(), "bad/name".into()],
                vec![CaskError::VolumeInUse { name: "b".into() }],
            ))
        });

        assert_eq!(report.removed, vec!["a"]);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.fatal.is_none());
        assert!(!report.is_clean());
        assert!(store.exists("b").unwrap());
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn remove_generator_error_is_fatal() {
        let (_temp, store) = open_store();
        let report = store.remove(|| Err(CaskError::invalid_state("deadline exceeded")));
        assert!(report.removed.is_empty());
        assert!(report.fatal.is_some());
        assert!(!store.is_locked());
    }

    #[test]
    fn prune_deletes_exactly_selected() {
        let (_temp, store) = open_store();
        store.create(Some("keep"), &[]).unwrap();
        store.create(Some("drop"), &[]).unwrap();

        let removed = store
            .prune(false, |volumes| {
                assert_eq!(volumes.len(), 2);
                Ok(vec!["drop".to_string()])
            })
            .unwrap();

        assert_eq!(removed, vec!["drop"]);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.exists("keep").unwrap());
    }

    #[test]
    fn namespaces_are_isolated() {
        let temp = tempdir().unwrap();
        let paths = CaskPaths::with_root(temp.path());
        let ns1 = VolumeStore::open(&paths, "ns1").unwrap();
        let ns2 = VolumeStore::open(&paths, "ns2").unwrap();

        ns1.create(Some("shared-name"), &[]).unwrap();
        assert!(ns2.get("shared-name", false).unwrap_err().is_not_found());
        assert_eq!(ns2.count().unwrap(), 0);
        assert!(VolumeStore::open(&paths, "../escape").is_err());
    }

    #[test]
    fn shared_store_blocks_other_threads() {
        use std::sync::{Arc, Barrier};

        let (_temp, store) = open_store();
        let store = Arc::new(store);
        let barrier = Arc::new(Barrier::new(2));

        let holder = {
            let (store, barrier) = (store.clone(), barrier.clone());
            std::thread::spawn(move || {
                let _guard = store.guard().unwrap();
                barrier.wait();
                std::thread::sleep(Duration::from_millis(200));
                // Nothing else may have been created while the lock was held.
                store.count().unwrap()
            })
        };

        barrier.wait();
        assert!(!store.is_locked());
        assert_eq!(
            store.create_without_lock(Some("sneaky"), &[]).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            store.lock_timeout(Duration::from_millis(20)).unwrap_err().kind(),
            ErrorKind::Storage
        );

        store.create(Some("waited"), &[]).unwrap();
        assert_eq!(holder.join().unwrap(), 0);
        assert!(store.exists("waited").unwrap());
    }

    #[test]
    fn concurrent_creates_are_serialized() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = root.clone();
                std::thread::spawn(move || {
                    let store =
                        VolumeStore::open(&CaskPaths::with_root(root), "default").unwrap();
                    store
                        .create(Some("contended"), &[format!("writer={i}")])
                        .unwrap();
                    store.create(Some(&format!("own-{i}")), &[]).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = VolumeStore::open(&CaskPaths::with_root(root), "default").unwrap();
        let volumes = store.list(false).unwrap();
        assert_eq!(volumes.len(), 9);
        assert_eq!(volumes["contended"].labels.len(), 1);
    }
}
