//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// High-water mark of one stream in one division
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationCursor {
    /// Largest `Timestamp` row version seen
    RowVersion(i64),
    /// Latest `Modified` value seen
    Modified(NaiveDateTime),
}

impl ReplicationCursor {
    /// Compare with a cursor of the same kind; `None` when the kinds differ
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::RowVersion(a), Self::RowVersion(b)) => Some(a.cmp(b)),
            (Self::Modified(a), Self::Modified(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The later of two cursors of the same kind; `other` wins when kinds differ
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        match self.compare(&other) {
            Some(Ordering::Greater) => self,
            _ => other,
        }
    }
}

impl std::fmt::Display for ReplicationCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowVersion(v) => write!(f, "{v}"),
            Self::Modified(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Cursor of one stream in one division
    pub fn partition_cursor(&self, stream: &str, division: &str) -> Option<ReplicationCursor> {
        self.get_stream(stream)?.get_partition(division)?.cursor
    }

    /// Move a partition cursor forward; returns whether it changed
    pub fn advance_partition_cursor(
        &mut self,
        stream: &str,
        division: &str,
        cursor: ReplicationCursor,
    ) -> bool {
        let partition = self.get_stream_mut(stream).get_partition_mut(division);
        match partition.cursor {
            Some(current) if current.compare(&cursor) != Some(Ordering::Less) => {
                if current.compare(&cursor).is_none() {
                    partition.cursor = Some(cursor);
                    return true;
                }
                false
            }
            _ => {
                partition.cursor = Some(cursor);
                true
            }
        }
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Per-division state
    #[serde(default)]
    pub partitions: BTreeMap<String, PartitionState>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get partition state
    pub fn get_partition(&self, division: &str) -> Option<&PartitionState> {
        self.partitions.get(division)
    }

    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, division: &str) -> &mut PartitionState {
        self.partitions.entry(division.to_string()).or_default()
    }
}

/// State for a single division
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Replication cursor within this division
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<ReplicationCursor>,
}
