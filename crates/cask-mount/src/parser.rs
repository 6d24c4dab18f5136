//! Mount flag parsing.
//!
//! `--mount` is rewritten into the `-v` / `--tmpfs` option spelling and then
//! resolved by the same code as those flags.

use std::path::{Path, PathBuf};

use cask_common::id;
use cask_common::{CaskError, CaskResult, ErrorKind, RamSize};
use cask_oci::Mount;
use cask_volume::VolumeStore;

use crate::mountinfo::HostMounts;
use crate::processed::{MountKind, Processed};
use crate::propagation::{self, Propagation};
use crate::tmpfs;

/// Source side of a volume-style mount.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    /// No source: create a fresh volume.
    Anonymous,
    /// A volume in the store.
    Named(String),
    /// A host path.
    Host(PathBuf),
}

/// Normalized `-v` / `--mount` argument.
#[derive(Debug, Clone)]
struct VolumeSpec {
    source: Source,
    destination: String,
    options: Vec<String>,
    mode: String,
}

/// Read/write option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadWrite,
    ReadOnly,
    RecursiveReadOnly,
}

/// Options recognized on a volume-style mount.
#[derive(Debug, Default)]
struct VolumeOptions {
    access: Option<Access>,
    propagation: Option<Propagation>,
    nonrecursive: bool,
}

impl VolumeOptions {
    fn parse(options: &[String]) -> CaskResult<Self> {
        let mut parsed = Self::default();
        for option in options.iter().map(|option| option.trim()) {
            let access = match option {
                "" => continue,
                "rw" => Some(Access::ReadWrite),
                "ro" => Some(Access::ReadOnly),
                "rro" => Some(Access::RecursiveReadOnly),
                _ => None,
            };
            if let Some(access) = access {
                if parsed.access.replace(access).is_some() {
                    return Err(CaskError::invalid_argument(format!(
                        "duplicate read/write option {option:?}"
                    )));
                }
                continue;
            }

            if let Ok(propagation) = option.parse::<Propagation>() {
                if parsed.propagation.replace(propagation).is_some() {
                    return Err(CaskError::invalid_argument(format!(
                        "duplicate propagation option {option:?}"
                    )));
                }
                continue;
            }

            match option {
                "bind" => parsed.nonrecursive = true,
                "rbind" => parsed.nonrecursive = false,
                unknown => tracing::warn!(option = unknown, "Ignoring unknown mount option"),
            }
        }
        Ok(parsed)
    }
}

/// Resolves mount flags against a volume store and the host mount table.
pub struct MountParser<'a> {
    store: &'a VolumeStore,
    host_mounts: &'a dyn HostMounts,
}

impl<'a> MountParser<'a> {
    /// Create a parser.
    pub const fn new(store: &'a VolumeStore, host_mounts: &'a dyn HostMounts) -> Self {
        Self { store, host_mounts }
    }

    /// Parse a `-v` / `--volume` argument: `[SRC:]DST[:OPTS]`.
    ///
    /// A missing bind source directory is created when `create_dir` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for malformed arguments or an
    /// unsupported propagation, or a storage error from the volume store.
    pub fn process_flag_v(&self, raw: &str, create_dir: bool) -> CaskResult<Processed> {
        let trimmed = raw.strip_prefix(':').unwrap_or(raw);
        let fields: Vec<&str> = trimmed.split(':').collect();

        let (source, destination, mode) = match fields.as_slice() {
            [destination] => (None, *destination, ""),
            [source, destination] => (Some(*source), *destination, ""),
            [source, destination, mode] => (Some(*source), *destination, *mode),
            _ => {
                return Err(CaskError::invalid_argument(format!(
                    "invalid volume specification {raw:?}: too many colons"
                )));
            }
        };

        let source = match source {
            None => Source::Anonymous,
            Some("") => {
                return Err(CaskError::invalid_argument(format!(
                    "invalid volume specification {raw:?}: empty source"
                )));
            }
            Some(source) if looks_like_volume_name(source) => Source::Named(source.to_string()),
            Some(source) => Source::Host(PathBuf::from(source)),
        };

        self.process_volume(
            VolumeSpec {
                source,
                destination: destination.to_string(),
                options: mode.split(',').map(str::to_string).collect(),
                mode: mode.to_string(),
            },
            create_dir,
        )
    }

    /// Parse a `--tmpfs` argument: `DST[:OPTS]`.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Unsupported`] on Windows and
    /// [`CaskError::InvalidArgument`] for a relative destination or a bad
    /// option.
    pub fn process_flag_tmpfs(&self, raw: &str) -> CaskResult<Processed> {
        let (destination, mode) = raw.split_once(':').unwrap_or((raw, ""));
        let options: Vec<&str> = mode.split(',').collect();
        tmpfs_mount(destination, &options, mode)
    }

    /// Parse a `--mount` argument.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for unknown types, missing
    /// fields or options that do not apply to the mount type, and
    /// [`CaskError::NotFound`] for a bind whose source does not exist.
    pub fn process_flag_mount(&self, raw: &str) -> CaskResult<Processed> {
        let mut fields = MountFields::parse(raw)?;
        let destination = fields.destination.take().ok_or_else(|| {
            CaskError::invalid_argument(format!("mount {raw:?} has no destination"))
        })?;

        if fields.kind != MountKind::Bind
            && (fields.propagation.is_some() || fields.nonrecursive.is_some())
        {
            return Err(CaskError::invalid_argument(format!(
                "bind options are only valid for type=bind in {raw:?}"
            )));
        }
        if fields.kind != MountKind::Tmpfs
            && (fields.tmpfs_size.is_some() || fields.tmpfs_mode.is_some())
        {
            return Err(CaskError::invalid_argument(format!(
                "tmpfs options are only valid for type=tmpfs in {raw:?}"
            )));
        }

        let options = fields.options();
        let mode = options.join(",");
        let source = match fields.kind {
            MountKind::Tmpfs => {
                if fields.source.is_some() {
                    return Err(CaskError::invalid_argument(format!(
                        "type=tmpfs does not take a source in {raw:?}"
                    )));
                }
                return tmpfs_mount(&destination, &options, &mode);
            }
            MountKind::Volume => match fields.source {
                None => Source::Anonymous,
                Some(source) if source.contains('/') || source.contains('\\') => {
                    return Err(CaskError::invalid_argument(format!(
                        "volume source {source:?} must be a volume name, not a path"
                    )));
                }
                Some(source) => Source::Named(source),
            },
            MountKind::Bind => {
                let source = fields.source.ok_or_else(|| {
                    CaskError::invalid_argument(format!("type=bind requires a source in {raw:?}"))
                })?;
                let source = absolutize(Path::new(&source))?;
                if !source.try_exists()? {
                    return Err(CaskError::NotFound {
                        what: format!("bind source path {}", source.display()),
                    });
                }
                Source::Host(source)
            }
        };

        self.process_volume(
            VolumeSpec {
                source,
                destination,
                options,
                mode,
            },
            false,
        )
    }

    fn process_volume(&self, spec: VolumeSpec, create_dir: bool) -> CaskResult<Processed> {
        validate_destination(&spec.destination)?;
        let parsed = VolumeOptions::parse(&spec.options)?;

        if parsed.propagation.is_some() && !matches!(spec.source, Source::Host(_)) {
            return Err(CaskError::invalid_argument(format!(
                "propagation option {:?} is only valid for bind mounts",
                spec.mode
            )));
        }
        let propagation = parsed.propagation.unwrap_or_default();

        let mut options = Vec::new();
        match parsed.access {
            Some(Access::ReadOnly) => options.push("ro".to_string()),
            Some(Access::RecursiveReadOnly) => {
                if propagation != Propagation::RPrivate {
                    tracing::warn!(
                        %propagation,
                        "Recursive read-only mounts require rprivate propagation"
                    );
                }
                options.push("ro".to_string());
                options.push("rro".to_string());
            }
            Some(Access::ReadWrite) | None => {}
        }
        options.push(propagation.as_str().to_string());
        options.push(if parsed.nonrecursive { "bind" } else { "rbind" }.to_string());

        let mut mutations = Vec::new();
        let (kind, source, name, anonymous_volume) = match spec.source {
            Source::Anonymous => {
                let volume = self.store.create(None, &[])?;
                tracing::debug!(name = %volume.name, destination = %spec.destination, "Created anonymous volume");
                (
                    MountKind::Volume,
                    volume.mountpoint,
                    Some(volume.name.clone()),
                    Some(volume.name),
                )
            }
            Source::Named(name) => {
                let volume = match self.store.get(&name, false) {
                    Ok(volume) => volume,
                    Err(err) if err.kind() == ErrorKind::NotFound => self.store.create(Some(&name), &[])?,
                    Err(err) => return Err(err),
                };
                (MountKind::Volume, volume.mountpoint, Some(name), None)
            }
            Source::Host(path) => {
                let path = prepare_bind_source(&path, create_dir)?;
                if let Some(mutation) = propagation::resolve(propagation, &path, self.host_mounts)? {
                    mutations.push(mutation);
                }
                (MountKind::Bind, path, None, None)
            }
        };

        Ok(Processed {
            kind,
            mount: Mount {
                destination: PathBuf::from(&spec.destination),
                mount_type: Some("bind".to_string()),
                source: Some(source),
                options,
            },
            name,
            anonymous_volume,
            mode: spec.mode,
            propagation: Some(propagation),
            mutations,
        })
    }
}

/// Fields of a `--mount` argument.
#[derive(Debug)]
struct MountFields {
    kind: MountKind,
    source: Option<String>,
    destination: Option<String>,
    access: Option<&'static str>,
    propagation: Option<String>,
    nonrecursive: Option<bool>,
    tmpfs_size: Option<RamSize>,
    tmpfs_mode: Option<u32>,
}

impl MountFields {
    fn parse(raw: &str) -> CaskResult<Self> {
        let mut fields = Self {
            kind: MountKind::Volume,
            source: None,
            destination: None,
            access: None,
            propagation: None,
            nonrecursive: None,
            tmpfs_size: None,
            tmpfs_mode: None,
        };

        for field in raw.split(',').map(str::trim).filter(|field| !field.is_empty()) {
            let (key, value) = match field.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (field, None),
            };
            let required = || {
                value.filter(|value| !value.is_empty()).ok_or_else(|| {
                    CaskError::invalid_argument(format!("mount field {key:?} requires a value"))
                })
            };

            match key {
                "type" => {
                    fields.kind = match required()? {
                        "bind" => MountKind::Bind,
                        "volume" => MountKind::Volume,
                        "tmpfs" => MountKind::Tmpfs,
                        other => {
                            return Err(CaskError::invalid_argument(format!(
                                "unsupported mount type {other:?}"
                            )));
                        }
                    };
                }
                "source" | "src" => fields.source = Some(required()?.to_string()),
                "destination" | "dst" | "target" => {
                    fields.destination = Some(required()?.to_string());
                }
                "readonly" | "ro" => {
                    fields.access = Some(if parse_bool(key, value)? { "ro" } else { "rw" });
                }
                "rw" => fields.access = Some(if parse_bool(key, value)? { "rw" } else { "ro" }),
                "rro" => fields.access = Some(if parse_bool(key, value)? { "rro" } else { "rw" }),
                "bind-propagation" => {
                    let value = required()?;
                    value.parse::<Propagation>()?;
                    fields.propagation = Some(value.to_string());
                }
                "bind-nonrecursive" => fields.nonrecursive = Some(parse_bool(key, value)?),
                "tmpfs-size" => fields.tmpfs_size = Some(RamSize::parse(required()?)?),
                "tmpfs-mode" => {
                    let value = required()?;
                    fields.tmpfs_mode = Some(u32::from_str_radix(value, 8).map_err(|_| {
                        CaskError::invalid_argument(format!("tmpfs-mode {value:?} is not octal"))
                    })?);
                }
                unknown => tracing::warn!(field = unknown, "Ignoring unknown mount field"),
            }
        }
        Ok(fields)
    }

    /// Options in the `-v` / `--tmpfs` spelling.
    fn options(&self) -> Vec<String> {
        let mut options = Vec::new();
        if let Some(access) = self.access {
            options.push(access.to_string());
        }
        if let Some(propagation) = &self.propagation {
            options.push(propagation.clone());
        }
        if self.nonrecursive == Some(true) {
            options.push("bind".to_string());
        }
        if let Some(size) = self.tmpfs_size {
            options.push(format!("size={}", size.as_bytes()));
        }
        if let Some(mode) = self.tmpfs_mode {
            options.push(format!("mode={mode:o}"));
        }
        options
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> CaskResult<bool> {
    match value {
        None | Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(CaskError::invalid_argument(format!(
            "mount field {key:?} expects true or false, got {other:?}"
        ))),
    }
}

fn tmpfs_mount<S: AsRef<str>>(destination: &str, options: &[S], mode: &str) -> CaskResult<Processed> {
    if cfg!(windows) {
        return Err(CaskError::Unsupported {
            feature: "tmpfs mounts".to_string(),
        });
    }
    validate_destination(destination)?;
    let options = tmpfs::merge_options(options)?;

    Ok(Processed {
        kind: MountKind::Tmpfs,
        mount: Mount {
            destination: PathBuf::from(destination),
            mount_type: Some("tmpfs".to_string()),
            source: Some(PathBuf::from("tmpfs")),
            options,
        },
        name: None,
        anonymous_volume: None,
        mode: mode.to_string(),
        propagation: None,
        mutations: Vec::new(),
    })
}

/// A `-v` source is a volume name when it has no path separator, does not
/// start with `.` and is a valid name.
fn looks_like_volume_name(source: &str) -> bool {
    !source.contains('/')
        && !source.contains('\\')
        && !source.starts_with('.')
        && id::validate(source).is_ok()
}

fn validate_destination(destination: &str) -> CaskResult<()> {
    if destination.is_empty() {
        return Err(CaskError::invalid_argument("mount destination must not be empty"));
    }
    let absolute = if cfg!(windows) {
        Path::new(destination).is_absolute()
    } else {
        destination.starts_with('/')
    };
    if !absolute {
        return Err(CaskError::invalid_argument(format!(
            "mount destination {destination:?} must be an absolute path"
        )));
    }
    Ok(())
}

fn absolutize(path: &Path) -> CaskResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let absolute = std::path::absolute(path)?;
    tracing::warn!(
        source = %path.display(),
        resolved = %absolute.display(),
        "Relative bind source resolved against the working directory"
    );
    Ok(absolute)
}

fn prepare_bind_source(path: &Path, create_dir: bool) -> CaskResult<PathBuf> {
    let path = absolutize(path)?;
    if !path.try_exists()? {
        if create_dir {
            std::fs::create_dir_all(&path)?;
            tracing::debug!(path = %path.display(), "Created bind source directory");
        } else {
            tracing::warn!(path = %path.display(), "Bind source does not exist");
        }
    }
    Ok(path)
}
