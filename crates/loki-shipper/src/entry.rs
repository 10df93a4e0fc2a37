//! Record boundary types and entry formatting.
//!
//! [`LogRecord`] is what the host logging framework hands to the shipper;
//! [`LogEntry`] is the formatted, label-resolved value that flows through
//! the rest of the pipeline. The entry timestamp is captured when the
//! record is created, never at delivery time, so queued delivery preserves
//! the original event time.

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::labels::{LabelSet, LabelValue};

/// Ordered severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Buckets a numeric host-framework level into a severity.
    ///
    /// Uses the conventional 10/20/30/40/50 thresholds; in-between values
    /// bucket down and anything below the debug threshold fails over to
    /// `Debug` rather than erroring.
    #[must_use]
    pub fn from_number(level: u32) -> Self {
        match level {
            0..=19 => Level::Debug,
            20..=29 => Level::Info,
            30..=39 => Level::Warning,
            40..=49 => Level::Error,
            _ => Level::Critical,
        }
    }

    /// Severity label value for this level.
    #[must_use]
    pub fn severity(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

/// One log record as emitted by the host logging framework.
///
/// The message is expected to be fully rendered; the shipper never formats
/// or truncates it. `tags` are per-record label sources layered over the
/// configured defaults, `extra` holds plain scalar fields that become both
/// labels and structured metadata.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Name of the emitting logger, becomes the `logger` label.
    pub logger: String,
    /// Severity, becomes the `severity` label.
    pub level: Level,
    /// Rendered message text.
    pub message: String,
    /// Capture time of the record.
    pub timestamp: SystemTime,
    /// Per-record label sources, overriding defaults on key collision.
    pub tags: BTreeMap<String, LabelValue>,
    /// Plain scalar fields, overriding tags on key collision.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current wall-clock time.
    #[must_use]
    pub fn new(logger: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            logger: logger.into(),
            level,
            message: message.into(),
            timestamp: SystemTime::now(),
            tags: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Attaches a per-record label source.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Attaches a plain scalar field.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One formatted entry: the unit that is grouped into streams and encoded.
///
/// Immutable once built, consumed exactly once by encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Event time, nanosecond resolution on the wire.
    pub timestamp: SystemTime,
    /// Resolved label set; stream-mates share a structurally equal set.
    pub labels: LabelSet,
    /// Rendered message text.
    pub message: String,
    /// Scalar metadata excluded from labels, carried as structured
    /// metadata when the payload version supports it.
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
    /// Formats a record into an entry under an already-resolved label set.
    #[must_use]
    pub(crate) fn from_record(record: LogRecord, labels: LabelSet) -> Self {
        LogEntry {
            timestamp: record.timestamp,
            labels,
            message: record.message,
            extra_fields: record.extra,
        }
    }
}
