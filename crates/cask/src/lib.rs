//! # Cask
//!
//! Command-line front end for the Cask volume store.
//!
//! ## Usage
//!
//! ```text
//! cask volume create --label tier=db data
//! cask container create --rm -v data:/var/lib/db -v /scratch web
//! cask volume ls --filter label=tier=db
//! cask container rm web
//! cask volume prune --all --force
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod containers;
pub mod format;
