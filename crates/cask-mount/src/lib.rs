//! # cask-mount
//!
//! Turns the container mount flags into OCI mount entries:
//!
//! - `-v [SRC:]DST[:OPTS]` for anonymous volumes, named volumes and binds
//! - `--tmpfs DST[:OPTS]`
//! - `--mount type=...,src=...,dst=...`
//!
//! Named and anonymous volumes are resolved against a
//! [`cask_volume::VolumeStore`]. Bind propagation is checked against the host
//! mount table and may require changing the container's rootfs propagation,
//! which is returned as a [`SpecMutation`].

#![warn(missing_docs)]

pub mod mountinfo;
pub mod parser;
pub mod processed;
pub mod propagation;
pub mod tmpfs;

pub use mountinfo::{HostMounts, MountInfo, MountTable, ProcMounts};
pub use parser::MountParser;
pub use processed::{MountKind, Processed, encode_mount_labels};
pub use propagation::{Propagation, SpecMutation};
