//! Version-dependent push payload encoding.
//!
//! Two historical wire shapes are supported, selected once at handler
//! construction; a handler never mixes shapes within its lifetime.
//!
//! Version `"1"` (current):
//!
//! ```json
//! {"streams": [{"stream": {"app": "x"}, "values": [["<ns>", "line"]]}]}
//! ```
//!
//! Version `"0"` (legacy) renders the label set as a single LogQL matcher
//! string instead of a nested mapping:
//!
//! ```json
//! {"streams": [{"labels": "{app=\"x\"}", "entries": [{"ts": "<ns>", "line": "line"}]}]}
//! ```
//!
//! In both shapes timestamps are nanosecond-precision integers expressed
//! as decimal strings, never native JSON numbers, to avoid precision loss
//! in intermediaries. Messages go out as raw UTF-8 with no truncation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::batch::Stream;
use crate::config::ConfigError;
use crate::entry::LogEntry;
use crate::labels::{scalar_to_label, LabelSet};

/// Push payload shape, fixed per handler instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadVersion {
    /// Legacy single-matcher shape for old aggregation backends.
    V0,
    /// Current multi-stream shape.
    #[default]
    V1,
}

impl PayloadVersion {
    /// Parses the configuration version string, `"0"` or `"1"`.
    pub fn parse(version: &str) -> Result<Self, ConfigError> {
        match version.trim() {
            "0" => Ok(PayloadVersion::V0),
            "1" => Ok(PayloadVersion::V1),
            other => Err(ConfigError::InvalidVersion(other.to_string())),
        }
    }
}

/// Serializes streams into the push payload body for one flush.
pub fn encode(version: PayloadVersion, streams: &[Stream]) -> serde_json::Result<Vec<u8>> {
    match version {
        PayloadVersion::V0 => serde_json::to_vec(&PayloadV0::build(streams)),
        PayloadVersion::V1 => serde_json::to_vec(&PayloadV1::build(streams)),
    }
}

#[derive(Serialize)]
struct PayloadV1<'a> {
    streams: Vec<StreamV1<'a>>,
}

#[derive(Serialize)]
struct StreamV1<'a> {
    stream: &'a LabelSet,
    values: Vec<ValueV1<'a>>,
}

/// One `values` element: `[ts, line]`, plus a structured-metadata object
/// when the entry carries extra fields.
#[derive(Serialize)]
#[serde(untagged)]
enum ValueV1<'a> {
    Plain(String, &'a str),
    WithMetadata(String, &'a str, BTreeMap<&'a str, String>),
}

impl<'a> PayloadV1<'a> {
    fn build(streams: &'a [Stream]) -> Self {
        PayloadV1 {
            streams: streams
                .iter()
                .map(|stream| StreamV1 {
                    stream: &stream.labels,
                    values: stream.entries.iter().map(ValueV1::from_entry).collect(),
                })
                .collect(),
        }
    }
}

impl<'a> ValueV1<'a> {
    fn from_entry(entry: &'a LogEntry) -> Self {
        let ts = epoch_nanos(entry.timestamp).to_string();
        if entry.extra_fields.is_empty() {
            ValueV1::Plain(ts, &entry.message)
        } else {
            // Metadata values render as strings the way extras render as
            // labels; Null fields are omitted.
            let metadata = entry
                .extra_fields
                .iter()
                .filter_map(|(key, value)| {
                    scalar_to_label(value).map(|text| (key.as_str(), text))
                })
                .collect();
            ValueV1::WithMetadata(ts, &entry.message, metadata)
        }
    }
}

#[derive(Serialize)]
struct PayloadV0<'a> {
    streams: Vec<StreamV0<'a>>,
}

#[derive(Serialize)]
struct StreamV0<'a> {
    labels: String,
    entries: Vec<EntryV0<'a>>,
}

#[derive(Serialize)]
struct EntryV0<'a> {
    ts: String,
    line: &'a str,
}

impl<'a> PayloadV0<'a> {
    fn build(streams: &'a [Stream]) -> Self {
        PayloadV0 {
            streams: streams
                .iter()
                .map(|stream| StreamV0 {
                    labels: label_matcher(&stream.labels),
                    entries: stream
                        .entries
                        .iter()
                        .map(|entry| EntryV0 {
                            ts: epoch_nanos(entry.timestamp).to_string(),
                            line: &entry.message,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Renders a label set as a LogQL matcher string, keys in sorted order,
/// values quote-escaped.
fn label_matcher(labels: &LabelSet) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"", value.replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn epoch_nanos(timestamp: SystemTime) -> u128 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn single_stream(entry: LogEntry) -> Vec<Stream> {
        vec![Stream {
            labels: entry.labels.clone(),
            entries: vec![entry],
        }]
    }

    fn entry(ts_nanos: u64, message: &str) -> LogEntry {
        LogEntry {
            timestamp: UNIX_EPOCH + Duration::from_nanos(ts_nanos),
            labels: labels(&[("app", "shipper"), ("severity", "info")]),
            message: message.to_string(),
            extra_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn version_parsing() {
        assert_eq!(PayloadVersion::parse("0").unwrap(), PayloadVersion::V0);
        assert_eq!(PayloadVersion::parse("1").unwrap(), PayloadVersion::V1);
        assert_eq!(PayloadVersion::parse(" 1 ").unwrap(), PayloadVersion::V1);
        assert!(matches!(
            PayloadVersion::parse("2"),
            Err(ConfigError::InvalidVersion(v)) if v == "2"
        ));
        assert_eq!(PayloadVersion::default(), PayloadVersion::V1);
    }

    #[test]
    fn v1_round_trip_recovers_entry() {
        let ts = 1_700_000_000_000_000_005_u64;
        let streams = single_stream(entry(ts, "Test message"));

        let body = encode(PayloadVersion::V1, &streams).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();

        let stream = &decoded["streams"][0];
        assert_eq!(stream["stream"]["app"], "shipper");
        assert_eq!(stream["stream"]["severity"], "info");

        let value = &stream["values"][0];
        // Timestamp must be a decimal string, not a JSON number.
        assert!(value[0].is_string());
        assert_eq!(value[0], ts.to_string());
        assert_eq!(value[1], "Test message");
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn v1_carries_structured_metadata() {
        let mut e = entry(42, "Test");
        e.extra_fields
            .insert("request_id".to_string(), json!("abc"));
        e.extra_fields.insert("attempt".to_string(), json!(2));
        e.extra_fields.insert("skip".to_string(), Value::Null);

        let body = encode(PayloadVersion::V1, &single_stream(e)).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();

        let value = &decoded["streams"][0]["values"][0];
        assert_eq!(value.as_array().unwrap().len(), 3);
        assert_eq!(value[2]["request_id"], "abc");
        assert_eq!(value[2]["attempt"], "2");
        assert!(value[2].get("skip").is_none());
    }

    #[test]
    fn v0_round_trip_recovers_entry() {
        let ts = 1_700_000_000_000_000_005_u64;
        let streams = single_stream(entry(ts, "Test message"));

        let body = encode(PayloadVersion::V0, &streams).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();

        let stream = &decoded["streams"][0];
        assert_eq!(stream["labels"], "{app=\"shipper\", severity=\"info\"}");

        let first = &stream["entries"][0];
        assert!(first["ts"].is_string());
        assert_eq!(first["ts"], ts.to_string());
        assert_eq!(first["line"], "Test message");
    }

    #[test]
    fn v0_matcher_escapes_quoted_values() {
        let mut e = entry(1, "Test");
        e.labels = labels(&[("app", "say \"hi\"")]);

        let body = encode(PayloadVersion::V0, &single_stream(e)).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded["streams"][0]["labels"], "{app=\"say \\\"hi\\\"\"}");
    }

    #[test]
    fn multiple_streams_keep_submission_order() {
        let first = entry(100, "first");
        let mut second = entry(200, "second");
        second.labels = labels(&[("app", "other")]);

        let streams = vec![
            Stream {
                labels: first.labels.clone(),
                entries: vec![first],
            },
            Stream {
                labels: second.labels.clone(),
                entries: vec![second],
            },
        ];

        let body = encode(PayloadVersion::V1, &streams).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();
        let arr = decoded["streams"].as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["values"][0][1], "first");
        assert_eq!(arr[1]["values"][0][1], "second");
    }

    #[test]
    fn pre_epoch_timestamp_clamps_to_zero() {
        let mut e = entry(0, "old");
        e.timestamp = UNIX_EPOCH - Duration::from_secs(1);

        let body = encode(PayloadVersion::V1, &single_stream(e)).unwrap();
        let decoded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded["streams"][0]["values"][0][0], "0");
    }
}
