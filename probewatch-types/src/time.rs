//! Timestamps and time ranges.

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Seconds since the Unix epoch, as used by the metrics service.
pub type Seconds = i64;

/// Anything stored in a range cache: it must expose the timestamp it is
/// ordered by.
pub trait Timed {
    /// The timestamp used for ordering and range filtering.
    fn time(&self) -> i64;
}

/// A closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Create a new range.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length of the range (zero when inverted).
    pub fn len(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    /// True when the range covers no time.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when `other` lies entirely within this range.
    pub fn contains(&self, other: &TimeRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Widen the range by `margin` on both sides.
    pub fn padded(&self, margin: i64) -> TimeRange {
        TimeRange::new(self.start - margin, self.end + margin)
    }
}

impl From<(i64, i64)> for TimeRange {
    fn from((start, end): (i64, i64)) -> Self {
        TimeRange::new(start, end)
    }
}
