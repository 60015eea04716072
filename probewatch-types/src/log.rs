//! State change log entries.

use crate::Timed;

/// One state change of a monitored service.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Seconds as delivered by the log service; milliseconds once stored.
    pub time: i64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub state: Option<i64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub output: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub alert_type: Option<String>,
}

impl LogEntry {
    pub fn new(time: i64) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }
}

impl Timed for LogEntry {
    fn time(&self) -> i64 {
        self.time
    }
}

/// Envelope returned by the log service.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogBatch {
    #[cfg_attr(feature = "serde", serde(default))]
    pub results: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_time() {
        assert_eq!(LogEntry::new(1234).time(), 1234);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_log_batch_from_service_json() {
        let json = r#"{"results":[
            {"time":1500000000,"state":2,"output":"CRITICAL - timeout","alert_type":"SERVICE ALERT"},
            {"time":1500000060}
        ]}"#;
        let batch: LogBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].state, Some(2));
        assert_eq!(batch.results[1].output, None);
    }
}
