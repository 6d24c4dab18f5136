//! Shell completion candidates.

use cask_common::CaskResult;

use crate::store::VolumeStore;

/// Sorted names of every volume in the store's namespace.
///
/// # Errors
///
/// Returns a storage error if the namespace directory cannot be read.
pub fn volume_names(store: &VolumeStore) -> CaskResult<Vec<String>> {
    volume_names_with_prefix(store, "")
}

/// Sorted names starting with `prefix`.
///
/// # Errors
///
/// Returns a storage error if the namespace directory cannot be read.
pub fn volume_names_with_prefix(store: &VolumeStore, prefix: &str) -> CaskResult<Vec<String>> {
    let mut names: Vec<String> = store
        .list(false)?
        .into_keys()
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();
    Ok(names)
}
