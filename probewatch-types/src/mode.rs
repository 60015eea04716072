//! Aggregation modes.

use std::fmt;
use std::str::FromStr;

/// How the samples of one bucket collapse into a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AggregateMode {
    /// Keep the highest sample.
    #[default]
    Max,
    /// Keep the lowest sample.
    Min,
    /// Average the samples that carry a value.
    Avg,
}

impl AggregateMode {
    /// The wire name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateMode::Max => "max",
            AggregateMode::Min => "min",
            AggregateMode::Avg => "avg",
        }
    }
}

impl fmt::Display for AggregateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown aggregation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown aggregation mode: {}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for AggregateMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(AggregateMode::Max),
            "min" => Ok(AggregateMode::Min),
            "avg" => Ok(AggregateMode::Avg),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
