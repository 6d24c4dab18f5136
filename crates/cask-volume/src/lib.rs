//! # cask-volume
//!
//! Persistent, namespaced storage for named and anonymous container volumes.
//!
//! ## Layout
//!
//! ```text
//! <data-root>/volumes/<namespace>/
//!   .lock                 # advisory flock shared by every cooperating process
//!   <volume-name>/
//!     _data/              # the mount-point exposed to containers
//!     volume.json         # {"labels": { "<k>": "<v>", ... }}
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use cask_common::CaskPaths;
//! use cask_volume::VolumeStore;
//!
//! # fn example() -> cask_common::CaskResult<()> {
//! let store = VolumeStore::open(&CaskPaths::new(), "default")?;
//! let volume = store.create(Some("data"), &["tier=db".to_string()])?;
//! println!("{}", volume.mountpoint.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod completion;
pub mod filter;
pub mod fsstore;
pub mod service;
pub mod store;
pub mod usage;

pub use filter::{FilterSet, VolumeFilter};
pub use fsstore::{FsStore, LockGuard};
pub use service::VolumeService;
pub use store::{RemoveReport, Volume, VolumeStore};
pub use usage::{ContainerSource, MountPoint, UsageReport};
