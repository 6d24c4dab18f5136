//! Host mount table lookup.
//!
//! Parses the `/proc/self/mountinfo` format:
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! ```
//!
//! Only the mount point (field 5) and the optional fields (between the mount
//! options and the `-` separator) are kept.

use std::path::{Path, PathBuf};

use cask_common::{CaskError, CaskResult};

/// Default location of the mount table.
pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Where the filesystem is mounted.
    pub mount_point: PathBuf,
    /// Optional fields such as `shared:1` or `master:2`.
    pub optional: Vec<String>,
}

impl MountInfo {
    /// Parse one mountinfo line.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] if the line is truncated.
    pub fn parse_line(line: &str) -> CaskResult<Self> {
        let invalid = || CaskError::invalid_argument(format!("malformed mountinfo line {line:?}"));

        let fields: Vec<&str> = line.split_whitespace().collect();
        let separator = fields
            .iter()
            .position(|field| *field == "-")
            .ok_or_else(invalid)?;
        if separator < 6 {
            return Err(invalid());
        }

        Ok(Self {
            mount_point: PathBuf::from(unescape(fields[4])),
            optional: fields[6..separator]
                .iter()
                .map(|field| (*field).to_string())
                .collect(),
        })
    }

    /// Returns true if the mount is a member of a peer group.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.optional.iter().any(|field| field.starts_with("shared:"))
    }

    /// Returns true if the mount receives propagation from a master.
    #[must_use]
    pub fn is_slave(&self) -> bool {
        self.optional.iter().any(|field| field.starts_with("master:"))
    }
}

/// Decode the octal escapes (`\040` and friends) the kernel uses for
/// whitespace and backslashes in paths.
fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Looks up the mount containing a host path.
pub trait HostMounts {
    /// The mount entry whose mount point is the longest prefix of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or no entry covers `path`.
    fn lookup(&self, path: &Path) -> CaskResult<MountInfo>;
}

/// A parsed mount table.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountInfo>,
}

impl MountTable {
    /// Parse a whole mountinfo document, skipping blank lines.
    ///
    /// # Errors
    ///
    /// Returns an error on the first malformed line.
    pub fn parse(text: &str) -> CaskResult<Self> {
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(MountInfo::parse_line)
            .collect::<CaskResult<_>>()?;
        Ok(Self { entries })
    }

    /// Read and parse [`PROC_MOUNTINFO`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read.
    pub fn load() -> CaskResult<Self> {
        Self::parse(&std::fs::read_to_string(PROC_MOUNTINFO)?)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest-prefix match; later entries win ties, as later mounts shadow
    /// earlier ones at the same point.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&MountInfo> {
        self.entries
            .iter()
            .filter(|entry| path.starts_with(&entry.mount_point))
            .max_by_key(|entry| entry.mount_point.components().count())
    }
}

impl HostMounts for MountTable {
    fn lookup(&self, path: &Path) -> CaskResult<MountInfo> {
        self.find(path).cloned().ok_or_else(|| CaskError::NotFound {
            what: format!("mount containing {}", path.display()),
        })
    }
}

/// The live mount table of this process.
///
/// Paths are canonicalized before lookup so symlinks resolve to the mount
/// that actually backs them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMounts;

impl HostMounts for ProcMounts {
    fn lookup(&self, path: &Path) -> CaskResult<MountInfo> {
        let canonical = std::fs::canonicalize(path)?;
        tracing::debug!(path = %canonical.display(), "Looking up host mount");
        MountTable::load()?.lookup(&canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
35 22 8:2 / /srv rw,relatime - ext4 /dev/sda2 rw
36 35 8:3 / /srv/shared rw shared:7 master:1 - ext4 /dev/sda3 rw
37 22 8:4 / /mnt/with\\040space rw master:3 - ext4 /dev/sda4 rw
";

    #[test]
    fn parses_optional_fields() {
        let table = MountTable::parse(TABLE).unwrap();
        assert_eq!(table.len(), 4);

        let root = table.find(Path::new("/etc/passwd")).unwrap();
        assert_eq!(root.mount_point, Path::new("/"));
        assert!(root.is_shared());
        assert!(!root.is_slave());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = MountTable::parse(TABLE).unwrap();

        let srv = table.find(Path::new("/srv/data")).unwrap();
        assert_eq!(srv.mount_point, Path::new("/srv"));
        assert!(srv.optional.is_empty());

        let nested = table.find(Path::new("/srv/shared/x")).unwrap();
        assert_eq!(nested.mount_point, Path::new("/srv/shared"));
        assert!(nested.is_shared());
        assert!(nested.is_slave());

        // component match, not string prefix
        let sibling = table.find(Path::new("/srvx")).unwrap();
        assert_eq!(sibling.mount_point, Path::new("/"));
    }

    #[test]
    fn unescapes_mount_points() {
        let table = MountTable::parse(TABLE).unwrap();
        let spaced = table.lookup(Path::new("/mnt/with space/dir")).unwrap();
        assert_eq!(spaced.mount_point, Path::new("/mnt/with space"));
        assert!(spaced.is_slave());
    }

    #[test]
    fn rejects_truncated_lines() {
        assert!(MountInfo::parse_line("22 1 8:1 / /").is_err());
        assert!(MountInfo::parse_line("22 1 8:1 / / rw shared:1 ext4").is_err());
    }

    #[test]
    fn lookup_without_cover_is_not_found() {
        let table = MountTable::parse("35 22 8:2 / /srv rw - ext4 /dev/sda2 rw").unwrap();
        assert!(table.lookup(Path::new("/home")).unwrap_err().is_not_found());
    }
}
