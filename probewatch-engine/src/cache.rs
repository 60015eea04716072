//! Keyed cache of time segments.
//!
//! Each key owns a list of segments `[start, end)` kept sorted by `start`.
//! Segments never overlap and never touch: inserting a range that overlaps
//! or touches existing segments absorbs them into a single one. Every
//! segment carries the entries downloaded for its span, ordered by time.

use std::collections::{BTreeMap, HashMap};

use probewatch_types::Timed;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A contiguous span of known data for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<E> {
    pub start: i64,
    pub end: i64,
    pub entries: Vec<E>,
}

impl<E> Segment<E> {
    /// True when `t` lies in `[start, end)`.
    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Entries bracketing a point in time.
#[derive(Debug, Clone, PartialEq)]
pub enum AtTime<E> {
    /// The time is outside every cached segment of the key.
    Outside,
    /// An entry sits exactly at the requested time.
    Exact(E),
    /// The closest entries before and after the requested time, within the
    /// segment that contains it.
    Between(Option<E>, Option<E>),
}

impl<E> AtTime<E> {
    pub fn is_outside(&self) -> bool {
        matches!(self, AtTime::Outside)
    }
}

// Rendered the way dashboard widgets expect: `[]`, `[entry]` or
// `[before, after]` with `null` for a missing side.
impl<E: Serialize> Serialize for AtTime<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AtTime::Outside => serializer.serialize_seq(Some(0))?.end(),
            AtTime::Exact(entry) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(entry)?;
                seq.end()
            }
            AtTime::Between(before, after) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(before)?;
                seq.serialize_element(after)?;
                seq.end()
            }
        }
    }
}

/// Segmented range cache keyed by probe name.
#[derive(Debug, Clone)]
pub struct RangeCache<E> {
    segments: HashMap<String, Vec<Segment<E>>>,
}

impl<E> Default for RangeCache<E> {
    fn default() -> Self {
        Self {
            segments: HashMap::new(),
        }
    }
}

impl<E: Timed + Clone> RangeCache<E> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sub-ranges of `[start, end)` not covered by any segment of `key`, in
    /// ascending order. `None` when nothing is missing.
    pub fn missing_ranges(&self, key: &str, start: i64, end: i64) -> Option<Vec<(i64, i64)>> {
        if start >= end {
            return None;
        }

        let Some(segments) = self.segments.get(key) else {
            return Some(vec![(start, end)]);
        };

        let mut gaps = Vec::new();
        let mut cursor = start;
        for segment in segments {
            if segment.start >= end {
                break;
            }
            if segment.end <= cursor {
                continue;
            }
            if segment.start > cursor {
                gaps.push((cursor, segment.start));
            }
            cursor = cursor.max(segment.end);
            if cursor >= end {
                break;
            }
        }

        if cursor < end {
            gaps.push((cursor, end));
        }

        if gaps.is_empty() {
            None
        } else {
            Some(gaps)
        }
    }

    /// Insert freshly downloaded entries covering `[start, end)`.
    ///
    /// Segments overlapping or touching the range are absorbed; the result
    /// spans the union of all bounds. Entries are merged by time, existing
    /// entries first on equal timestamps. Nothing is deduplicated.
    pub fn merge(&mut self, key: &str, start: i64, end: i64, mut entries: Vec<E>) {
        if start >= end {
            return;
        }

        entries.sort_by_key(|e| e.time());

        let segments = self.segments.entry(key.to_string()).or_default();
        let first = segments.partition_point(|s| s.end < start);
        let last = segments.partition_point(|s| s.start <= end);

        let mut merged_start = start;
        let mut merged_end = end;
        let mut existing = Vec::new();
        if first < last {
            for segment in segments.drain(first..last) {
                merged_start = merged_start.min(segment.start);
                merged_end = merged_end.max(segment.end);
                existing.extend(segment.entries);
            }
        }

        segments.insert(
            first,
            Segment {
                start: merged_start,
                end: merged_end,
                entries: merge_by_time(existing, entries),
            },
        );
    }

    /// Copies of the entries of each key with `start <= time < end`. Keys
    /// without segments map to an empty list.
    pub fn read<K: AsRef<str>>(&self, keys: &[K], start: i64, end: i64) -> BTreeMap<String, Vec<E>> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                let entries = self
                    .segments
                    .get(key)
                    .map(|segments| {
                        segments
                            .iter()
                            .filter(|s| s.start < end && s.end > start)
                            .flat_map(|s| s.entries.iter())
                            .filter(|e| e.time() >= start && e.time() < end)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                (key.to_string(), entries)
            })
            .collect()
    }

    /// Copies of the entries around `t` for each key.
    pub fn at_time<K: AsRef<str>>(&self, keys: &[K], t: i64) -> BTreeMap<String, AtTime<E>> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                let result = match self.find_segment(key, t) {
                    Some(segment) => bracket(&segment.entries, t),
                    None => AtTime::Outside,
                };
                (key.to_string(), result)
            })
            .collect()
    }

    /// The segments currently held for `key`.
    pub fn segments(&self, key: &str) -> &[Segment<E>] {
        self.segments.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys with at least one segment.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.keys().map(String::as_str)
    }

    /// Drop everything cached for `key`. Returns `true` if it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.segments.remove(key).is_some()
    }

    fn find_segment(&self, key: &str, t: i64) -> Option<&Segment<E>> {
        self.segments.get(key)?.iter().find(|s| s.contains(t))
    }
}

fn bracket<E: Timed + Clone>(entries: &[E], t: i64) -> AtTime<E> {
    let mut previous: Option<&E> = None;
    for entry in entries {
        if entry.time() > t {
            return AtTime::Between(previous.cloned(), Some(entry.clone()));
        }
        if entry.time() == t {
            return AtTime::Exact(entry.clone());
        }
        previous = Some(entry);
    }
    AtTime::Between(previous.cloned(), None)
}

/// Stable merge of two time-ordered lists; `existing` wins ties.
pub fn merge_by_time<E: Timed>(existing: Vec<E>, incoming: Vec<E>) -> Vec<E> {
    if existing.is_empty() {
        return incoming;
    }
    if incoming.is_empty() {
        return existing;
    }

    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut existing = existing.into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();

    loop {
        let take_existing = match (existing.peek(), incoming.peek()) {
            (Some(a), Some(b)) => a.time() <= b.time(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_existing {
            existing.next()
        } else {
            incoming.next()
        };
        merged.extend(next);
    }

    merged
}
