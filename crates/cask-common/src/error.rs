//! Common error types for the Cask volume tooling.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`CaskError`].
pub type CaskResult<T> = Result<T, CaskError>;

/// Coarse classification of a [`CaskError`].
///
/// Batch operations use the kind to decide whether an error is a per-item
/// warning or aborts the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed user input.
    InvalidArgument,
    /// Volume or file is absent.
    NotFound,
    /// An entry that was expected to be absent already exists.
    AlreadyExists,
    /// The operation is not allowed in the current state (e.g. volume in use).
    FailedPrecondition,
    /// Unexpected filesystem or serialization failure.
    Storage,
    /// Programming error such as a re-entrant lock.
    InvalidState,
    /// Not available on this platform.
    NotImplemented,
}

/// Common errors across the Cask crates.
#[derive(Error, Diagnostic, Debug)]
pub enum CaskError {
    /// Volume not found.
    #[error("no such volume: {name}")]
    #[diagnostic(code(cask::volume::not_found))]
    VolumeNotFound {
        /// The volume name that was not found.
        name: String,
    },

    /// A file or path inside the store is missing.
    #[error("not found: {what}")]
    #[diagnostic(code(cask::not_found))]
    NotFound {
        /// Description of what is missing.
        what: String,
    },

    /// Invalid volume name format.
    #[error("invalid volume name: {name:?}")]
    #[diagnostic(
        code(cask::volume::invalid_name),
        help("Volume names must match [a-zA-Z0-9][a-zA-Z0-9_.-]* and be at most 255 characters")
    )]
    InvalidVolumeName {
        /// The invalid name.
        name: String,
    },

    /// Invalid argument (label, mount specification, option combination).
    #[error("{message}")]
    #[diagnostic(code(cask::invalid_argument))]
    InvalidArgument {
        /// The error message.
        message: String,
    },

    /// An entry already exists.
    #[error("already exists: {name}")]
    #[diagnostic(code(cask::already_exists))]
    AlreadyExists {
        /// The entry name.
        name: String,
    },

    /// Volume is referenced by at least one container.
    #[error("volume {name:?} is in use")]
    #[diagnostic(
        code(cask::volume::in_use),
        help("Remove the containers that reference the volume first")
    )]
    VolumeInUse {
        /// The volume name.
        name: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(cask::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(cask::serialization))]
    Serialization(String),

    /// Invalid internal state (re-entrant lock, missing lock).
    #[error("invalid state: {message}")]
    #[diagnostic(
        code(cask::invalid_state),
        help("This is a bug, please report it at https://github.com/fishmindlabs360/cask/issues")
    )]
    InvalidState {
        /// The error message.
        message: String,
    },

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(code(cask::unsupported))]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },
}

impl CaskError {
    /// Shorthand for an [`CaskError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for an [`CaskError::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::VolumeNotFound { .. } | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidVolumeName { .. } | Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::VolumeInUse { .. } => ErrorKind::FailedPrecondition,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Unsupported { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for CaskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CaskError::VolumeNotFound {
            name: "data".to_string(),
        };
        assert_eq!(err.to_string(), "no such volume: data");

        let err = CaskError::VolumeInUse {
            name: "data".to_string(),
        };
        assert_eq!(err.to_string(), "volume \"data\" is in use");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CaskError = io_err.into();
        assert!(matches!(err, CaskError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn error_kinds() {
        assert!(CaskError::VolumeNotFound { name: "x".into() }.is_not_found());
        assert_eq!(
            CaskError::invalid_argument("bad").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            CaskError::invalid_state("locked").kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            CaskError::VolumeInUse { name: "x".into() }.kind(),
            ErrorKind::FailedPrecondition
        );
    }
}
