//! # cask-common
//!
//! Shared utilities and types for the Cask volume tooling.
//!
//! This crate provides common functionality used across all Cask crates:
//! - Volume name validation and anonymous name generation
//! - Standard filesystem paths
//! - RAM size parsing
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;
pub mod resource;

pub use error::{CaskError, CaskResult, ErrorKind};
pub use id::VolumeName;
pub use paths::CaskPaths;
pub use resource::RamSize;
