//! RAM size parsing and representation.
//!
//! Accepts Docker-style human readable sizes, always in powers of 1024:
//! - "64m", "64M", "64mb", "64MiB" -> 64 * 1024^2 bytes
//! - "1.5g" -> 1.5 * 1024^3 bytes
//! - "1024" or "1024b" -> 1024 bytes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CaskError, CaskResult};

const KI: u64 = 1024;
const MI: u64 = KI * 1024;
const GI: u64 = MI * 1024;
const TI: u64 = GI * 1024;
const PI: u64 = TI * 1024;

/// A memory size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RamSize(u64);

impl RamSize {
    /// Create a size from bytes.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Get the size in bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Parse a human readable size string.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for empty, negative or
    /// unknown-unit values.
    pub fn parse(s: &str) -> CaskResult<Self> {
        let invalid = || CaskError::invalid_argument(format!("invalid size: {s:?}"));
        let trimmed = s.trim();

        let digits_end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(digits_end);
        if number.is_empty() {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit = unit.trim_start().to_ascii_lowercase();
        let unit = unit.strip_suffix('b').unwrap_or(&unit);
        let unit = unit.strip_suffix('i').unwrap_or(unit);

        let multiplier = match unit {
            "" => 1,
            "k" => KI,
            "m" => MI,
            "g" => GI,
            "t" => TI,
            "p" => PI,
            _ => return Err(invalid()),
        };

        Ok(Self((value * multiplier as f64) as u64))
    }
}

impl fmt::Display for RamSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value >= GI && value % GI == 0 {
            write!(f, "{}GiB", value / GI)
        } else if value >= MI && value % MI == 0 {
            write!(f, "{}MiB", value / MI)
        } else if value >= KI && value % KI == 0 {
            write!(f, "{}KiB", value / KI)
        } else {
            write!(f, "{value}B")
        }
    }
}

impl FromStr for RamSize {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_bytes() {
        assert_eq!(RamSize::parse("1024").unwrap().as_bytes(), 1024);
        assert_eq!(RamSize::parse("512b").unwrap().as_bytes(), 512);
    }

    #[test]
    fn parse_units() {
        assert_eq!(RamSize::parse("64m").unwrap().as_bytes(), 64 * MI);
        assert_eq!(RamSize::parse("64M").unwrap().as_bytes(), 64 * MI);
        assert_eq!(RamSize::parse("64mb").unwrap().as_bytes(), 64 * MI);
        assert_eq!(RamSize::parse("64MiB").unwrap().as_bytes(), 64 * MI);
        assert_eq!(RamSize::parse("1g").unwrap().as_bytes(), GI);
        assert_eq!(RamSize::parse("100 k").unwrap().as_bytes(), 100 * KI);
    }

    #[test]
    fn parse_fractional() {
        assert_eq!(RamSize::parse("1.5k").unwrap().as_bytes(), 1536);
    }

    #[test]
    fn parse_invalid() {
        assert!(RamSize::parse("").is_err());
        assert!(RamSize::parse("m").is_err());
        assert!(RamSize::parse("-1m").is_err());
        assert!(RamSize::parse("12x").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(RamSize::from_bytes(64 * MI).to_string(), "64MiB");
        assert_eq!(RamSize::from_bytes(2048).to_string(), "2KiB");
        assert_eq!(RamSize::from_bytes(500).to_string(), "500B");
    }
}
