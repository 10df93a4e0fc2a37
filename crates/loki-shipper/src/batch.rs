//! Grouping of entries into label-identical streams.
//!
//! Entries are stream-mates iff their label sets are structurally equal.
//! The batcher preserves entry insertion order within a stream and stream
//! first-encounter order, and it never re-sorts by timestamp: producers
//! emit in time order and silently reordering causally-ordered events is
//! an explicit non-goal.

use std::collections::HashMap;

use crate::entry::LogEntry;
use crate::labels::LabelSet;

/// An ordered run of entries sharing one label set. Built transiently per
/// flush and discarded after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Label set shared by every entry in the stream.
    pub labels: LabelSet,
    /// Entries in the order they were submitted.
    pub entries: Vec<LogEntry>,
}

/// Groups entries into streams by label-set equality.
#[must_use]
pub fn group_streams(entries: Vec<LogEntry>) -> Vec<Stream> {
    let mut streams: Vec<Stream> = Vec::new();
    let mut index: HashMap<LabelSet, usize> = HashMap::new();

    for entry in entries {
        match index.get(&entry.labels) {
            Some(&at) => streams[at].entries.push(entry),
            None => {
                index.insert(entry.labels.clone(), streams.len());
                streams.push(Stream {
                    labels: entry.labels.clone(),
                    entries: vec![entry],
                });
            }
        }
    }

    streams
}
