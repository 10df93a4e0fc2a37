//! Label sources and layered label resolution.
//!
//! A label source is either a constant string or a computed zero-argument
//! source evaluated fresh per entry. Resolution layers configured defaults,
//! the record's severity and logger, per-record tags, and plain extra
//! fields into one deduplicated set; on key collision the later layer wins.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::entry::LogRecord;
use crate::wire::PayloadVersion;

/// Label key carrying the record severity.
pub const LEVEL_LABEL: &str = "severity";

/// Label key carrying the emitting logger name.
pub const LOGGER_LABEL: &str = "logger";

/// Resolved, deduplicated label mapping. Structural equality decides
/// stream membership, so the ordered map doubles as the grouping key.
pub type LabelSet = BTreeMap<String, String>;

/// One label source: a constant or a computed value.
///
/// Computed sources returning `None` or an empty string omit the label for
/// that entry; a `Some` result is used verbatim.
#[derive(Clone)]
pub enum LabelValue {
    /// Fixed label value.
    Constant(String),
    /// Evaluated per entry with no arguments.
    Computed(Arc<dyn Fn() -> Option<String> + Send + Sync>),
}

impl LabelValue {
    /// Wraps a closure as a computed label source.
    pub fn computed<F>(source: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        LabelValue::Computed(Arc::new(source))
    }
}

impl fmt::Debug for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            LabelValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Constant(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Constant(value)
    }
}

/// Resolves the final label set for one record.
///
/// Layering, last write wins: configured defaults, then `severity` and
/// `logger`, then record tags, then plain extras. Record-supplied label
/// names are sanitized to the LogQL character set; names empty after
/// sanitization drop the label. Under payload version `"0"` any computed
/// source in any layer is a configuration error, detected here rather than
/// at encode time.
pub fn resolve(
    version: PayloadVersion,
    defaults: &BTreeMap<String, LabelValue>,
    record: &LogRecord,
) -> Result<LabelSet, ConfigError> {
    let mut labels = LabelSet::new();

    for (key, value) in defaults {
        apply(&mut labels, key, value, version)?;
    }

    labels.insert(LEVEL_LABEL.to_string(), record.level.severity().to_string());
    labels.insert(LOGGER_LABEL.to_string(), record.logger.clone());

    for (key, value) in &record.tags {
        let name = sanitize_label_name(key);
        if name.is_empty() {
            continue;
        }
        apply(&mut labels, &name, value, version)?;
    }

    for (key, value) in &record.extra {
        let name = sanitize_label_name(key);
        if name.is_empty() {
            continue;
        }
        if let Some(text) = scalar_to_label(value) {
            labels.insert(name, text);
        }
    }

    Ok(labels)
}

fn apply(
    labels: &mut LabelSet,
    key: &str,
    value: &LabelValue,
    version: PayloadVersion,
) -> Result<(), ConfigError> {
    match value {
        LabelValue::Constant(value) => {
            labels.insert(key.to_string(), value.clone());
        }
        LabelValue::Computed(source) => {
            // Rejected before evaluation: the legacy shape must not carry
            // dynamic values even when the source would return None.
            if version == PayloadVersion::V0 {
                return Err(ConfigError::ComputedLabel {
                    label: key.to_string(),
                });
            }
            match source() {
                Some(value) if !value.is_empty() => {
                    labels.insert(key.to_string(), value);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Reduces a label name to the LogQL-safe character set.
///
/// Quotes are stripped, spaces, dots and dashes become underscores, and
/// everything else outside `[A-Za-z0-9_]` is dropped.
pub(crate) fn sanitize_label_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '\'' | '"' => {}
            ' ' | '.' | '-' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => {}
        }
    }
    out
}

/// Label text for a plain scalar extra. `Null` omits the label, strings
/// are used as-is, other scalars render without quoting.
pub(crate) fn scalar_to_label(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
