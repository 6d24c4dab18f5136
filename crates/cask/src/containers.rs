//! File-backed container records.
//!
//! Each container lives in `<root>/containers/<namespace>/<id>/` with its
//! OCI state in `state.json` and, once created, its OCI spec in
//! `config.json`.

use std::io::Write;
use std::path::{Path, PathBuf};

use cask_common::{CaskError, CaskResult, id};
use cask_oci::{ContainerState, Spec};
use cask_volume::ContainerSource;

const STATE_FILE: &str = "state.json";
const CONFIG_FILE: &str = "config.json";

/// Container records of one namespace.
#[derive(Debug, Clone)]
pub struct StateDir {
    dir: PathBuf,
}

impl StateDir {
    /// Records stored under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory of one container.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for a malformed container id.
    pub fn container_dir(&self, container_id: &str) -> CaskResult<PathBuf> {
        id::validate(container_id)
            .map_err(|_| CaskError::invalid_argument(format!("invalid container id {container_id:?}")))?;
        Ok(self.dir.join(container_id))
    }

    /// Returns true if a record exists.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed id or an unreadable directory.
    pub fn exists(&self, container_id: &str) -> CaskResult<bool> {
        Ok(self.container_dir(container_id)?.join(STATE_FILE).try_exists()?)
    }

    /// Persist a container's state.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be written.
    pub fn save(&self, state: &ContainerState) -> CaskResult<()> {
        let dir = self.container_dir(&state.id)?;
        write_json(&dir, STATE_FILE, &serde_json::to_vec_pretty(state)?)?;
        tracing::debug!(container_id = %state.id, path = %dir.display(), "Saved container state");
        Ok(())
    }

    /// Persist a container's OCI spec next to its state.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be written.
    pub fn save_spec(&self, container_id: &str, spec: &Spec) -> CaskResult<PathBuf> {
        let dir = self.container_dir(container_id)?;
        write_json(&dir, CONFIG_FILE, &serde_json::to_vec_pretty(spec)?)?;
        Ok(dir.join(CONFIG_FILE))
    }

    /// Load a container's state.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if there is no such container.
    pub fn load(&self, container_id: &str) -> CaskResult<ContainerState> {
        let path = self.container_dir(container_id)?.join(STATE_FILE);
        let json = match std::fs::read(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaskError::NotFound {
                    what: format!("container {container_id}"),
                });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&json)?)
    }

    /// Remove a container's record.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be removed.
    pub fn delete(&self, container_id: &str) -> CaskResult<()> {
        let dir = self.container_dir(container_id)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(container_id, path = %dir.display(), "Deleted container state");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Ids of every container with a state file, sorted.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be read.
    pub fn list(&self) -> CaskResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.path().join(STATE_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ContainerSource for StateDir {
    fn containers(&self) -> CaskResult<Vec<ContainerState>> {
        let mut containers = Vec::new();
        for container_id in self.list()? {
            match self.load(&container_id) {
                Ok(state) => containers.push(state),
                Err(err) => {
                    tracing::warn!(container_id, %err, "Skipping unreadable container state");
                }
            }
        }
        Ok(containers)
    }
}

fn write_json(dir: &Path, file: &str, data: &[u8]) -> CaskResult<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(file)).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_state() {
        let temp = tempdir().unwrap();
        let states = StateDir::new(temp.path());

        let state = ContainerState::new("web").with_label("k", "v");
        states.save(&state).unwrap();

        let loaded = states.load("web").unwrap();
        assert_eq!(loaded.id, "web");
        assert_eq!(loaded.labels.get("k").map(String::as_str), Some("v"));
        assert!(states.exists("web").unwrap());
    }

    #[test]
    fn list_and_delete() {
        let temp = tempdir().unwrap();
        let states = StateDir::new(temp.path().join("missing-yet"));
        assert!(states.list().unwrap().is_empty());

        states.save(&ContainerState::new("b")).unwrap();
        states.save(&ContainerState::new("a")).unwrap();
        assert_eq!(states.list().unwrap(), vec!["a", "b"]);

        states.delete("a").unwrap();
        states.delete("a").unwrap();
        assert_eq!(states.list().unwrap(), vec!["b"]);
        assert!(states.load("a").unwrap_err().is_not_found());
    }

    #[test]
    fn unreadable_states_are_skipped() {
        let temp = tempdir().unwrap();
        let states = StateDir::new(temp.path());
        states.save(&ContainerState::new("good")).unwrap();
        std::fs::create_dir_all(temp.path().join("bad")).unwrap();
        std::fs::write(temp.path().join("bad").join(STATE_FILE), "{not json").unwrap();

        let containers = states.containers().unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "good");
    }

    #[test]
    fn rejects_path_like_ids() {
        let temp = tempdir().unwrap();
        let states = StateDir::new(temp.path());
        assert!(states.load("../escape").is_err());
        assert!(states.save(&ContainerState::new("a/b")).is_err());
    }
}
