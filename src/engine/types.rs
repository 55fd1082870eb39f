//! Engine types
//!
//! Message types, configuration and statistics for the sync engine.

use crate::error::Result;
use crate::normalize::NormalizedRecord;
use crate::schema::StreamDefinition;
use crate::state::ReplicationCursor;
use crate::types::{JsonValue, LogLevel};
use serde_json::json;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Schema of a stream, sent before its records
    Schema {
        /// Stream name
        stream: String,
        /// JSON Schema of the records
        schema: JsonValue,
        /// Primary key fields
        key_properties: Vec<String>,
        /// Replication key, if the stream is incremental
        bookmark_properties: Vec<String>,
    },
    /// A single record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: NormalizedRecord,
    },
    /// Complete state after a finished partition
    State {
        /// Serialized state
        value: JsonValue,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create the schema message of a stream
    pub fn schema(stream: &StreamDefinition) -> Self {
        Self::Schema {
            stream: stream.name.to_string(),
            schema: stream.json_schema().to_json(),
            key_properties: stream.primary_keys.iter().map(ToString::to_string).collect(),
            bookmark_properties: stream
                .replication_key()
                .map(|key| vec![key.to_string()])
                .unwrap_or_default(),
        }
    }

    /// Create a record message
    pub fn record(stream: impl Into<String>, record: NormalizedRecord) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(value: JsonValue) -> Self {
        Self::State { value }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a debug log
    pub fn debug(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Debug, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a schema message
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }

    /// Singer representation; log messages have none and go to the log instead
    pub fn to_singer(&self) -> Option<JsonValue> {
        match self {
            Self::Schema {
                stream,
                schema,
                key_properties,
                bookmark_properties,
            } => {
                let mut value = json!({
                    "type": "SCHEMA",
                    "stream": stream,
                    "schema": schema,
                    "key_properties": key_properties,
                });
                if !bookmark_properties.is_empty() {
                    value["bookmark_properties"] = json!(bookmark_properties);
                }
                Some(value)
            }
            Self::Record { stream, record } => Some(json!({
                "type": "RECORD",
                "stream": stream,
                "record": record.to_json(),
            })),
            Self::State { value } => Some(json!({
                "type": "STATE",
                "value": value,
            })),
            Self::Log { .. } => None,
        }
    }

    /// One JSON line for stdout, or `None` for log messages
    pub fn to_singer_line(&self) -> Result<Option<String>> {
        self.to_singer()
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(Into::into)
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Divisions to extract, in output order
    pub divisions: Vec<String>,
    /// Number of divisions fetched at the same time
    pub partition_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            divisions: Vec::new(),
            partition_concurrency: 1,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the divisions
    #[must_use]
    pub fn with_divisions<I, S>(mut self, divisions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.divisions = divisions.into_iter().map(Into::into).collect();
        self
    }

    /// Set how many divisions are fetched concurrently
    #[must_use]
    pub fn with_partition_concurrency(mut self, concurrency: usize) -> Self {
        self.partition_concurrency = concurrency.max(1);
        self
    }
}

/// Result of fetching one stream in one division
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutput {
    /// Division the records belong to
    pub division: String,
    /// Records in page order
    pub records: Vec<NormalizedRecord>,
    /// Pages requested
    pub pages: usize,
    /// Records dropped because a field could not be coerced
    pub skipped: usize,
    /// High-water mark after this fetch
    pub cursor: Option<ReplicationCursor>,
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: usize,
    /// Records skipped over malformed fields
    pub records_skipped: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Total streams synced
    pub streams_synced: usize,
    /// Total partitions synced
    pub partitions_synced: usize,
    /// Errors encountered
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished partition
    pub fn add_partition(&mut self, output: &PartitionOutput) {
        self.records_synced += output.records.len();
        self.records_skipped += output.skipped;
        self.pages_fetched += output.pages;
        self.partitions_synced += 1;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
