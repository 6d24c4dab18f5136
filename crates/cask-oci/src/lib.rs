//! # cask-oci
//!
//! OCI (Open Container Initiative) specification types for Cask.
//!
//! This crate provides Rust types for:
//! - The subset of the OCI Runtime Specification (config.json) that volume
//!   and mount handling touches
//! - Container state descriptors carrying container labels

#![warn(missing_docs)]

pub mod runtime;
pub mod state;

pub use runtime::{Mount, Spec};
pub use state::{ContainerState, ContainerStatus};
