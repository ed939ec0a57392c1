//! Metric values with an explicit missing marker

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text written in place of a missing metric in tabular output.
pub const MISSING_MARKER: &str = "NA";

/// Why a metric could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingReason {
    /// The run failed before producing output.
    RunFailed,
    /// The run succeeded but the extract file is absent.
    ExtractAbsent,
    /// The extract exists but the field could not be read as a number.
    ExtractMalformed,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunFailed => f.write_str("run failed"),
            Self::ExtractAbsent => f.write_str("extract file absent"),
            Self::ExtractMalformed => f.write_str("extract file malformed"),
        }
    }
}

/// One extracted metric: a number, or an explicit missing marker.
///
/// Missing never collapses into a numeric sentinel, so a failed run can
/// never be mistaken for a real result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Metric {
    /// Extracted value.
    Value(f64),
    /// Not obtainable, with the reason.
    Missing(MissingReason),
}

impl Metric {
    /// The numeric value, if present.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Missing(_) => None,
        }
    }

    /// Whether this is the missing marker.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Missing(_) => f.write_str(MISSING_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_value() {
        let metric = Metric::Value(0.5);
        assert_eq!(metric.value(), Some(0.5));
        assert!(!metric.is_missing());
        assert_eq!(metric.to_string(), "0.5");
    }

    #[test]
    fn test_metric_missing_marker() {
        let metric = Metric::Missing(MissingReason::ExtractAbsent);
        assert_eq!(metric.value(), None);
        assert!(metric.is_missing());
        assert_eq!(metric.to_string(), MISSING_MARKER);
    }
}
