//! Bind mount propagation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use cask_common::{CaskError, CaskResult};
use cask_oci::Spec;

use crate::mountinfo::HostMounts;

/// Propagation mode of a bind mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// `private`
    Private,
    /// `rprivate`
    #[default]
    RPrivate,
    /// `shared`
    Shared,
    /// `rshared`
    RShared,
    /// `slave`
    Slave,
    /// `rslave`
    RSlave,
}

impl Propagation {
    /// The mount option spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::RPrivate => "rprivate",
            Self::Shared => "shared",
            Self::RShared => "rshared",
            Self::Slave => "slave",
            Self::RSlave => "rslave",
        }
    }

    /// `shared` or `rshared`.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        matches!(self, Self::Shared | Self::RShared)
    }

    /// `slave` or `rslave`.
    #[must_use]
    pub const fn is_slave(self) -> bool {
        matches!(self, Self::Slave | Self::RSlave)
    }
}

impl FromStr for Propagation {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "rprivate" => Ok(Self::RPrivate),
            "shared" => Ok(Self::Shared),
            "rshared" => Ok(Self::RShared),
            "slave" => Ok(Self::Slave),
            "rslave" => Ok(Self::RSlave),
            other => Err(CaskError::invalid_argument(format!(
                "invalid propagation mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to the container spec required by a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecMutation {
    /// Make the rootfs at least shared.
    RootfsShared,
    /// Make the rootfs at least recursive-slave.
    RootfsSlave,
}

impl SpecMutation {
    /// Apply to `spec`, leaving an already sufficient setting alone.
    pub fn apply(self, spec: &mut Spec) {
        let current = spec.rootfs_propagation().unwrap_or_default();
        match self {
            Self::RootfsShared => {
                if !matches!(current, "shared" | "rshared") {
                    spec.set_rootfs_propagation("shared");
                }
            }
            Self::RootfsSlave => {
                if !matches!(current, "shared" | "rshared" | "slave" | "rslave") {
                    spec.set_rootfs_propagation("rslave");
                }
            }
        }
    }
}

/// Check that the host side of a bind supports `propagation`.
///
/// Shared propagation needs a shared source mount. Slave propagation needs a
/// source that is shared or itself a slave. Private modes need nothing.
///
/// # Errors
///
/// Returns [`CaskError::InvalidArgument`] if the source mount does not
/// qualify or cannot be found in the mount table.
pub fn resolve(
    propagation: Propagation,
    source: &Path,
    host: &dyn HostMounts,
) -> CaskResult<Option<SpecMutation>> {
    if !propagation.is_shared() && !propagation.is_slave() {
        return Ok(None);
    }

    let info = host.lookup(source).map_err(|err| {
        CaskError::invalid_argument(format!(
            "cannot determine mount of {} for {propagation} propagation: {err}",
            source.display()
        ))
    })?;
    tracing::debug!(
        source = %source.display(),
        mount_point = %info.mount_point.display(),
        optional = ?info.optional,
        "Resolved host mount"
    );

    if propagation.is_shared() {
        if !info.is_shared() {
            return Err(CaskError::invalid_argument(format!(
                "path {} is mounted on {} but it is not a shared mount",
                source.display(),
                info.mount_point.display()
            )));
        }
        return Ok(Some(SpecMutation::RootfsShared));
    }

    if !info.is_shared() && !info.is_slave() {
        return Err(CaskError::invalid_argument(format!(
            "path {} is mounted on {} but it is not a shared or slave mount",
            source.display(),
            info.mount_point.display()
        )));
    }
    Ok(Some(SpecMutation::RootfsSlave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mountinfo::MountTable;

    fn table() -> MountTable {
        MountTable::parse(
            "1 0 8:1 / / rw - ext4 /dev/sda1 rw\n\
             2 1 8:2 / /shared rw shared:4 - ext4 /dev/sda2 rw\n\
             3 1 8:3 / /slave rw master:4 - ext4 /dev/sda3 rw\n",
        )
        .unwrap()
    }

    #[test]
    fn private_modes_need_nothing() {
        for mode in [Propagation::Private, Propagation::RPrivate] {
            assert_eq!(resolve(mode, Path::new("/any"), &table()).unwrap(), None);
        }
    }

    #[test]
    fn shared_requires_shared_source() {
        assert_eq!(
            resolve(Propagation::RShared, Path::new("/shared/x"), &table()).unwrap(),
            Some(SpecMutation::RootfsShared)
        );
        let err = resolve(Propagation::Shared, Path::new("/slave/x"), &table()).unwrap_err();
        assert_eq!(err.kind(), cask_common::ErrorKind::InvalidArgument);
        assert!(resolve(Propagation::Shared, Path::new("/home"), &table()).is_err());
    }

    #[test]
    fn slave_accepts_shared_or_slave_source() {
        for path in ["/shared/x", "/slave/x"] {
            assert_eq!(
                resolve(Propagation::RSlave, Path::new(path), &table()).unwrap(),
                Some(SpecMutation::RootfsSlave)
            );
        }
        assert!(resolve(Propagation::Slave, Path::new("/home"), &table()).is_err());
    }

    #[test]
    fn rootfs_mutations_only_strengthen() {
        let mut spec = Spec::default();
        SpecMutation::RootfsSlave.apply(&mut spec);
        assert_eq!(spec.rootfs_propagation(), Some("rslave"));

        SpecMutation::RootfsShared.apply(&mut spec);
        assert_eq!(spec.rootfs_propagation(), Some("shared"));

        SpecMutation::RootfsSlave.apply(&mut spec);
        assert_eq!(spec.rootfs_propagation(), Some("shared"));

        spec.set_rootfs_propagation("rshared");
        SpecMutation::RootfsShared.apply(&mut spec);
        assert_eq!(spec.rootfs_propagation(), Some("rshared"));

        spec.set_rootfs_propagation("slave");
        SpecMutation::RootfsSlave.apply(&mut spec);
        assert_eq!(spec.rootfs_propagation(), Some("slave"));
    }

    #[test]
    fn parse_round_trip() {
        for token in ["private", "rprivate", "shared", "rshared", "slave", "rslave"] {
            assert_eq!(token.parse::<Propagation>().unwrap().as_str(), token);
        }
        assert!("rbind".parse::<Propagation>().is_err());
        assert_eq!(Propagation::default(), Propagation::RPrivate);
    }
}
