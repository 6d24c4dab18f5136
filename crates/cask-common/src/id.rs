//! Volume name validation and anonymous name generation.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CaskError, CaskResult};

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("volume name pattern is valid")
});

/// A validated volume name.
///
/// Volume names must:
/// - Be 1-255 characters long
/// - Contain only alphanumeric characters, `_`, `.` and `-`
/// - Start with an alphanumeric character
///
/// Anonymous names are 64 lowercase hex characters and satisfy the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeName(String);

impl VolumeName {
    /// Maximum length of a volume name.
    pub const MAX_LENGTH: usize = 255;

    /// Length of a generated anonymous name.
    pub const ANONYMOUS_LENGTH: usize = 64;

    /// Create a new volume name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidVolumeName`] if the format is invalid.
    pub fn new(name: impl Into<String>) -> CaskResult<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Generate a fresh anonymous name: 256 random bits as lowercase hex.
    #[must_use]
    pub fn generate_anonymous() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Returns true if the name has the shape of a generated anonymous name.
    #[must_use]
    pub fn looks_anonymous(&self) -> bool {
        self.0.len() == Self::ANONYMOUS_LENGTH
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a volume (or namespace) name string.
///
/// # Errors
///
/// Returns [`CaskError::InvalidVolumeName`] if the name is empty, too long or
/// contains characters outside `[a-zA-Z0-9_.-]`.
pub fn validate(name: &str) -> CaskResult<()> {
    if name.is_empty() || name.len() > VolumeName::MAX_LENGTH || !NAME_PATTERN.is_match(name) {
        return Err(CaskError::InvalidVolumeName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VolumeName {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VolumeName {
    type Error = CaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VolumeName> for String {
    fn from(name: VolumeName) -> Self {
        name.0
    }
}

impl AsRef<str> for VolumeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_volume_names() {
        assert!(VolumeName::new("abc123").is_ok());
        assert!(VolumeName::new("my-volume").is_ok());
        assert!(VolumeName::new("my_volume").is_ok());
        assert!(VolumeName::new("my.volume").is_ok());
        assert!(VolumeName::new("V").is_ok());
        assert!(VolumeName::new("a".repeat(255)).is_ok());
    }

    #[test]
    fn invalid_volume_names() {
        assert!(VolumeName::new("").is_err());
        assert!(VolumeName::new("-invalid").is_err());
        assert!(VolumeName::new(".hidden").is_err());
        assert!(VolumeName::new("_invalid").is_err());
        assert!(VolumeName::new("with/slash").is_err());
        assert!(VolumeName::new("invalid!").is_err());
        assert!(VolumeName::new("a".repeat(256)).is_err());
    }

    #[test]
    fn generate_anonymous_name() {
        let a = VolumeName::generate_anonymous();
        let b = VolumeName::generate_anonymous();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.looks_anonymous());
        assert!(!VolumeName::new("data").unwrap().looks_anonymous());
    }

    #[test]
    fn serde_rejects_invalid() {
        let ok: VolumeName = serde_json::from_str("\"data\"").unwrap();
        assert_eq!(ok.as_str(), "data");
        assert!(serde_json::from_str::<VolumeName>("\"../etc\"").is_err());
    }

    proptest! {
        #[test]
        fn generated_names_always_validate(_seed in 0u8..32) {
            let name = VolumeName::generate_anonymous();
            prop_assert!(validate(name.as_str()).is_ok());
            prop_assert!(name.looks_anonymous());
        }

        #[test]
        fn names_with_separators_are_rejected(prefix in "[a-z0-9]{1,8}", suffix in "[a-z0-9]{0,8}") {
            let with_slash = format!("{prefix}/{suffix}");
            let with_backslash = format!("{prefix}\\{suffix}");
            prop_assert!(validate(&with_slash).is_err());
            prop_assert!(validate(&with_backslash).is_err());
        }

        #[test]
        fn docker_identifiers_are_accepted(name in "[a-zA-Z0-9][a-zA-Z0-9_.-]{0,40}") {
            prop_assert!(VolumeName::new(name).is_ok());
        }
    }
}
