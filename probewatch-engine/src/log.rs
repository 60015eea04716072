//! State change log store for one host/service pair.

use probewatch_types::{LogEntry, Millis};

use crate::cache::merge_by_time;

/// Time-ordered log entries with the range they cover.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    known: Option<(Millis, Millis)>,
    entries: Vec<LogEntry>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Time span between the oldest and newest stored entry.
    pub fn known(&self) -> Option<(Millis, Millis)> {
        self.known
    }

    /// Entries with `from <= time <= until`, bounds clamped to the known
    /// range.
    pub fn get_logs(&self, from: Option<Millis>, until: Option<Millis>) -> Vec<LogEntry> {
        let Some((known_from, known_until)) = self.known else {
            return Vec::new();
        };
        let from = from.map_or(known_from, |f| f.max(known_from));
        let until = until.map_or(known_until, |u| u.min(known_until));

        self.entries
            .iter()
            .skip_while(|e| e.time < from)
            .take_while(|e| e.time <= until)
            .cloned()
            .collect()
    }

    /// Add entries delivered by the log service. Their times are in seconds
    /// and get stored in milliseconds.
    pub fn set_data(&mut self, results: Vec<LogEntry>) {
        if results.is_empty() {
            return;
        }

        let mut incoming: Vec<LogEntry> = results
            .into_iter()
            .map(|mut entry| {
                entry.time *= 1000;
                entry
            })
            .collect();
        incoming.sort_by_key(|e| e.time);

        let first = incoming[0].time;
        let last = incoming[incoming.len() - 1].time;
        self.known = Some(match self.known {
            Some((from, until)) => (from.min(first), until.max(last)),
            None => (first, last),
        });

        let existing = std::mem::take(&mut self.entries);
        self.entries = merge_by_time(existing, incoming);
    }
}
