//! Filters accepted by `volume ls` and `volume prune`.
//!
//! Grammar:
//! - `name=<substring>`
//! - `label=<key>` or `label=<key>=<value>`
//! - `size<op><bytes>` with `<op>` one of `=`, `<`, `>`, `<=`, `>=`

use std::str::FromStr;

use cask_common::CaskError;

use crate::store::Volume;

/// Comparison used by a size filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl SizeOp {
    fn holds(self, actual: u64, expected: u64) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Lt => actual < expected,
            Self::Gt => actual > expected,
            Self::Le => actual <= expected,
            Self::Ge => actual >= expected,
        }
    }
}

/// A single volume filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeFilter {
    /// Substring match on the name.
    Name(String),
    /// Label key present, optionally with an exact value.
    Label {
        /// Label key.
        key: String,
        /// Required value.
        value: Option<String>,
    },
    /// Size comparison in bytes.
    Size {
        /// Comparison operator.
        op: SizeOp,
        /// Right-hand side in bytes.
        bytes: u64,
    },
}

impl VolumeFilter {
    /// Returns true if `volume` passes this filter.
    ///
    /// Size filters never match a volume whose size was not computed.
    #[must_use]
    pub fn matches(&self, volume: &Volume) -> bool {
        match self {
            Self::Name(needle) => volume.name.contains(needle.as_str()),
            Self::Label { key, value } => match (volume.labels.get(key), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            Self::Size { op, bytes } => volume.size.is_some_and(|size| op.holds(size, *bytes)),
        }
    }
}

impl FromStr for VolumeFilter {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CaskError::invalid_argument(format!("invalid filter {s:?}: {reason}"));

        if let Some(rest) = s.strip_prefix("size") {
            let (op, number) = [
                (">=", SizeOp::Ge),
                ("<=", SizeOp::Le),
                ("=", SizeOp::Eq),
                ("<", SizeOp::Lt),
                (">", SizeOp::Gt),
            ]
            .into_iter()
            .find_map(|(token, op)| rest.strip_prefix(token).map(|number| (op, number)))
            .ok_or_else(|| invalid("expected one of =, <, >, <=, >="))?;
            let bytes = number
                .trim()
                .parse()
                .map_err(|_| invalid("size must be an integer number of bytes"))?;
            return Ok(Self::Size { op, bytes });
        }

        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| invalid("expected key=value"))?;
        match key {
            "name" => Ok(Self::Name(value.to_string())),
            "label" => {
                let (label_key, label_value) = match value.split_once('=') {
                    Some((k, v)) => (k, Some(v.to_string())),
                    None => (value, None),
                };
                if label_key.is_empty() {
                    return Err(invalid("label key must not be empty"));
                }
                Ok(Self::Label {
                    key: label_key.to_string(),
                    value: label_value,
                })
            }
            other => Err(invalid(&format!("unknown filter key {other:?}"))),
        }
    }
}

/// A conjunction of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<VolumeFilter>,
}

impl FilterSet {
    /// Parse every `--filter` argument.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for the first malformed filter.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, CaskError> {
        let filters = raw
            .iter()
            .map(|filter| filter.as_ref().parse())
            .collect::<Result<_, _>>()?;
        Ok(Self { filters })
    }

    /// Returns true if any filter needs volume sizes.
    #[must_use]
    pub fn needs_size(&self) -> bool {
        self.filters
            .iter()
            .any(|filter| matches!(filter, VolumeFilter::Size { .. }))
    }

    /// Returns true if `volume` passes every filter.
    #[must_use]
    pub fn matches(&self, volume: &Volume) -> bool {
        self.filters.iter().all(|filter| filter.matches(volume))
    }
}
