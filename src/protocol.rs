//! The dashboard's message protocol.
//!
//! Every message is one JSON array per line: `[opcode, payload, signature]`.
//! The signature is optional and opaque; replies to a request carry the
//! same one so clients can route them.
//!
//! | In | Request | Replies |
//! |----|---------|---------|
//! | 1  | set base URL (`"url"` or `["url", "separator"]`) | |
//! | 2  | register probe (`"name"`, `["name", interval]`, `{name, interval}`) | |
//! | 3  | fetch `{probes, start, end}` | 1, 11, 10 |
//! | 6  | get query | 6, 10 |
//! | 7  | update timeline | 0, 1, 11, then as 6 |
//! | 8  | check aggregation level | 8 when changed |
//! | 9  | cursor lookup (`date`) | 9 |
//! | 10 | get logs | 10 when any |
//! | 11 | delete probe (`"name"`) | |
//!
//! Errors are answered with opcode 9001, diagnostics with opcode 0.

use std::collections::BTreeMap;

use probewatch_engine::{
    ceil_millis, floor_millis, AggregatedSeries, FocusQuery, LogMap, Millis, Query,
};
use probewatch_types::{RawForecast, RawValues};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors decoding or encoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The message is not a `[opcode, payload, ...]` array.
    #[error("Passed object must be an array of two or more values")]
    NotAnArray,

    /// No request is known under this opcode.
    #[error("Unknown opcode {0}")]
    UnknownOpcode(i64),

    /// The payload does not fit the opcode.
    #[error("Invalid payload for opcode {opcode}: {message}")]
    InvalidPayload { opcode: i64, message: String },
}

/// Reply opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Notice = 0,
    Values = 1,
    Series = 6,
    Aggregates = 8,
    Cursor = 9,
    Logs = 10,
    Forecasts = 11,
    Error = 9001,
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SetBaseUrl { url: String, separator: Option<String> },
    Register { name: String, interval: u32 },
    Fetch { probes: Vec<String>, start: Option<Millis>, end: Option<Millis> },
    Get(Query),
    UpdateTimeline(Query),
    CheckAggregate(FocusQuery),
    Cursor(Millis),
    Logs(Query),
    Unregister(String),
}

impl Request {
    /// True for requests that may wait on the transport.
    pub fn fetches(&self) -> bool {
        matches!(self, Request::Fetch { .. } | Request::UpdateTimeline(_))
    }
}

/// A request with the signature its replies must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub request: Request,
    pub signature: Option<Value>,
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Notice(String),
    Values(RawValues),
    Series(BTreeMap<String, AggregatedSeries>),
    Aggregates(BTreeMap<String, AggregatedSeries>),
    Cursor { values: BTreeMap<String, Option<f64>>, date: Millis },
    Logs(LogMap),
    Forecasts(BTreeMap<String, RawForecast>),
    Error(String),
}

impl Response {
    pub fn opcode(&self) -> Opcode {
        match self {
            Response::Notice(_) => Opcode::Notice,
            Response::Values(_) => Opcode::Values,
            Response::Series(_) => Opcode::Series,
            Response::Aggregates(_) => Opcode::Aggregates,
            Response::Cursor { .. } => Opcode::Cursor,
            Response::Logs(_) => Opcode::Logs,
            Response::Forecasts(_) => Opcode::Forecasts,
            Response::Error(_) => Opcode::Error,
        }
    }

    fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Response::Notice(message) | Response::Error(message) => Ok(Value::from(message.as_str())),
            Response::Values(values) => serde_json::to_value(values),
            Response::Series(series) | Response::Aggregates(series) => serde_json::to_value(series),
            Response::Cursor { values, date } => Ok(json!({ "values": values, "date": date })),
            Response::Logs(logs) => serde_json::to_value(logs),
            Response::Forecasts(forecasts) => serde_json::to_value(forecasts),
        }
    }
}

/// A response addressed to the requester's signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: Response,
    pub signature: Option<Value>,
}

impl Reply {
    pub fn new(response: Response, signature: Option<Value>) -> Self {
        Self { response, signature }
    }

    pub fn error(message: impl Into<String>, signature: Option<Value>) -> Self {
        Self::new(Response::Error(message.into()), signature)
    }

    /// Encode as one line of JSON, without the trailing newline.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let opcode = self.response.opcode() as u16;
        let payload = self.response.payload()?;
        let message = match &self.signature {
            Some(signature) => json!([opcode, payload, signature]),
            None => json!([opcode, payload]),
        };
        Ok(serde_json::to_string(&message)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaseUrl {
    Url(String),
    WithSeparator(String, Option<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Registration {
    Name(String),
    Pair(String, Option<u32>),
    Object {
        name: String,
        #[serde(default)]
        interval: Option<u32>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProbeList {
    Names(Vec<String>),
    Map(BTreeMap<String, Value>),
}

#[derive(Deserialize)]
struct FetchPayload {
    probes: ProbeList,
    #[serde(default, deserialize_with = "floor_millis")]
    start: Option<Millis>,
    #[serde(default, deserialize_with = "ceil_millis")]
    end: Option<Millis>,
}

/// Decode one line.
pub fn decode(line: &str) -> Result<Envelope, ProtocolError> {
    let message: Value = serde_json::from_str(line)?;
    let Value::Array(mut parts) = message else {
        return Err(ProtocolError::NotAnArray);
    };
    if parts.len() < 2 {
        return Err(ProtocolError::NotAnArray);
    }

    let signature = parts.get(2).cloned().filter(|s| !s.is_null());
    let payload = parts.swap_remove(1);
    let opcode = parts[0].as_i64().ok_or(ProtocolError::NotAnArray)?;

    let invalid = |e: serde_json::Error| ProtocolError::InvalidPayload {
        opcode,
        message: e.to_string(),
    };

    let request = match opcode {
        1 => match serde_json::from_value(payload).map_err(invalid)? {
            BaseUrl::Url(url) => Request::SetBaseUrl { url, separator: None },
            BaseUrl::WithSeparator(url, separator) => Request::SetBaseUrl { url, separator },
        },
        2 => {
            let (name, interval) = match serde_json::from_value(payload).map_err(invalid)? {
                Registration::Name(name) => (name, None),
                Registration::Pair(name, interval) => (name, interval),
                Registration::Object { name, interval } => (name, interval),
            };
            Request::Register {
                name,
                interval: interval.unwrap_or(1),
            }
        }
        3 => {
            let fetch: FetchPayload = serde_json::from_value(payload).map_err(invalid)?;
            let probes = match fetch.probes {
                ProbeList::Names(names) => names,
                ProbeList::Map(map) => map.into_keys().collect(),
            };
            Request::Fetch {
                probes,
                start: fetch.start,
                end: fetch.end,
            }
        }
        6 => Request::Get(serde_json::from_value(payload).map_err(invalid)?),
        7 => Request::UpdateTimeline(serde_json::from_value(payload).map_err(invalid)?),
        8 => Request::CheckAggregate(serde_json::from_value(payload).map_err(invalid)?),
        9 => {
            let date: f64 = serde_json::from_value(payload).map_err(invalid)?;
            if !date.is_finite() {
                return Err(ProtocolError::InvalidPayload {
                    opcode,
                    message: "date must be a finite number".to_string(),
                });
            }
            Request::Cursor(date.floor() as Millis)
        }
        10 => Request::Logs(serde_json::from_value(payload).map_err(invalid)?),
        11 => Request::Unregister(serde_json::from_value(payload).map_err(invalid)?),
        other => return Err(ProtocolError::UnknownOpcode(other)),
    };

    Ok(Envelope { request, signature })
}

#[cfg(test)]
mod tests {
    use super::*;
    use probewatch_engine::{AggregateMode, ProbeOptions};
    use probewatch_types::TimeRange;

    #[test]
    fn test_decode_set_base_url() {
        let envelope = decode(r#"[1, "http://metrics:5000"]"#).unwrap();
        assert_eq!(
            envelope.request,
            Request::SetBaseUrl {
                url: "http://metrics:5000".to_string(),
                separator: None
            }
        );
        assert_eq!(envelope.signature, None);

        let envelope = decode(r#"[1, ["http://metrics:5000", "::"]]"#).unwrap();
        assert_eq!(
            envelope.request,
            Request::SetBaseUrl {
                url: "http://metrics:5000".to_string(),
                separator: Some("::".to_string())
            }
        );
    }

    #[test]
    fn test_decode_register_shapes() {
        let expected = |interval| Request::Register {
            name: "a[SEP]b[SEP]c".to_string(),
            interval,
        };
        assert_eq!(decode(r#"[2, "a[SEP]b[SEP]c"]"#).unwrap().request, expected(1));
        assert_eq!(decode(r#"[2, ["a[SEP]b[SEP]c", 5]]"#).unwrap().request, expected(5));
        assert_eq!(
            decode(r#"[2, {"name": "a[SEP]b[SEP]c", "interval": 10}]"#).unwrap().request,
            expected(10)
        );
    }

    #[test]
    fn test_decode_fetch() {
        let envelope = decode(r#"[3, {"probes": ["a", "b"], "start": 1000.5, "end": 2000.5}, 42]"#).unwrap();
        assert_eq!(
            envelope.request,
            Request::Fetch {
                probes: vec!["a".to_string(), "b".to_string()],
                start: Some(1000),
                end: Some(2001),
            }
        );
        assert_eq!(envelope.signature, Some(json!(42)));
        assert!(envelope.request.fetches());

        let envelope = decode(r#"[3, {"probes": {"b": {}, "a": {"stacked": true}}}]"#).unwrap();
        assert_eq!(
            envelope.request,
            Request::Fetch {
                probes: vec!["a".to_string(), "b".to_string()],
                start: None,
                end: None,
            }
        );
    }

    #[test]
    fn test_decode_queries() {
        let envelope = decode(
            r#"[6, {"probes": {"a": {"stacked": true, "scale": 1}}, "start": 0, "end": 10, "mode": "avg"}, "sig"]"#,
        )
        .unwrap();
        let Request::Get(query) = envelope.request else {
            panic!("expected a get request");
        };
        assert_eq!(query.probes["a"], ProbeOptions::stacked("1"));
        assert_eq!(query.mode, AggregateMode::Avg);
        assert_eq!(envelope.signature, Some(json!("sig")));

        let envelope = decode(r#"[7, {"probes": {"a": {}}, "start": 5}]"#).unwrap();
        assert!(envelope.request.fetches());

        let envelope = decode(
            r#"[8, {"probes": {"a": {}}, "contextTimeline": [0, 100], "focusTimeline": [10, 20]}]"#,
        )
        .unwrap();
        let Request::CheckAggregate(query) = envelope.request else {
            panic!("expected an aggregate check");
        };
        assert_eq!(query.focus, TimeRange::new(10, 20));
    }

    #[test]
    fn test_decode_cursor_and_unregister() {
        assert_eq!(decode("[9, 1234.9]").unwrap().request, Request::Cursor(1234));
        assert_eq!(
            decode(r#"[11, "a"]"#).unwrap().request,
            Request::Unregister("a".to_string())
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode(r#"{"op": 1}"#), Err(ProtocolError::NotAnArray)));
        assert!(matches!(decode("[1]"), Err(ProtocolError::NotAnArray)));
        assert!(matches!(decode(r#"["x", 1]"#), Err(ProtocolError::NotAnArray)));
        assert!(matches!(decode("[4, {}]"), Err(ProtocolError::UnknownOpcode(4))));
        assert!(matches!(
            decode(r#"[9, "soon"]"#),
            Err(ProtocolError::InvalidPayload { opcode: 9, .. })
        ));
        assert!(matches!(
            decode(r#"[6, {"start": 0}]"#),
            Err(ProtocolError::InvalidPayload { opcode: 6, .. })
        ));
    }

    #[test]
    fn test_encode_replies() {
        let reply = Reply::new(Response::Notice("hello".to_string()), None);
        assert_eq!(reply.encode().unwrap(), r#"[0,"hello"]"#);

        let reply = Reply::error("boom", Some(json!(7)));
        assert_eq!(reply.encode().unwrap(), r#"[9001,"boom",7]"#);

        let reply = Reply::new(
            Response::Cursor {
                values: BTreeMap::from([("a".to_string(), Some(1.5)), ("b".to_string(), None)]),
                date: 60_000,
            },
            Some(json!("s")),
        );
        let encoded: Value = serde_json::from_str(&reply.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!([9, {"values": {"a": 1.5, "b": null}, "date": 60000}, "s"])
        );
    }
}
