//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `StreamFetcher` - Pages through one stream in one division
//! - `SyncEngine` - Runs streams over all divisions with state management
//! - Message types for output (Schema, Record, State, Log)

mod fetcher;
mod types;

pub use fetcher::{
    build_filter, record_cursor, StreamFetcher, FILTER_DATETIME_FORMAT, INITIAL_ROW_VERSION,
};
pub use types::{Message, PartitionOutput, SyncConfig, SyncStats};

use crate::error::{Error, Result};
use crate::schema::StreamDefinition;
use crate::state::StateManager;
use futures::StreamExt;
use std::time::Instant;
use tracing::{error, info};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Page fetcher
    fetcher: StreamFetcher,
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(fetcher: StreamFetcher, state: StateManager) -> Self {
        Self {
            fetcher,
            state,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the fetcher
    pub fn fetcher(&self) -> &StreamFetcher {
        &self.fetcher
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Sync one stream over every configured division, handing messages to `emit`.
    ///
    /// Divisions run up to `partition_concurrency` at a time; their output
    /// keeps division order. A division's records are emitted before its
    /// cursor is advanced, so a saved cursor never runs ahead of the output.
    /// When a division fails, the divisions before it stay emitted and saved.
    pub async fn sync_stream<F>(&mut self, stream: &StreamDefinition, mut emit: F) -> Result<()>
    where
        F: FnMut(&Message) -> Result<()>,
    {
        let start = Instant::now();
        emit(&Message::info(format!("Starting sync for stream: {}", stream.name)))?;
        emit(&Message::schema(stream))?;

        let mut cursors = Vec::with_capacity(self.config.divisions.len());
        for division in &self.config.divisions {
            let cursor = self.state.get_partition_cursor(stream.name, division).await;
            cursors.push((division.clone(), cursor));
        }

        let fetcher = &self.fetcher;
        let mut partitions = futures::stream::iter(cursors)
            .map(|(division, cursor)| async move {
                if fetcher.is_shutdown() {
                    return Err(Error::Interrupted {
                        stream: stream.name.to_string(),
                        division,
                    });
                }
                fetcher.fetch_partition(stream, &division, cursor).await
            })
            .buffered(self.config.partition_concurrency.max(1));

        loop {
            let output = match partitions.next().await {
                Some(Ok(output)) => output,
                None => break,
                Some(Err(e)) => {
                    self.stats.add_error();
                    error!(stream = stream.name, "Sync failed: {e}");
                    return Err(e);
                }
            };

            self.stats.add_partition(&output);
            if output.skipped > 0 {
                emit(&Message::warn(format!(
                    "Skipped {} malformed records in division {}",
                    output.skipped, output.division
                )))?;
            }

            for record in output.records {
                emit(&Message::record(stream.name, record))?;
            }

            if let Some(cursor) = output.cursor {
                self.state
                    .advance_partition_cursor(stream.name, &output.division, cursor)
                    .await?;
            }
            let state = serde_json::to_value(&*self.state.state().await)?;
            emit(&Message::state(state))?;
        }

        self.stats.add_stream();
        #[allow(clippy::cast_possible_truncation)]
        self.stats
            .set_duration(self.stats.duration_ms + start.elapsed().as_millis() as u64);

        info!(
            stream = stream.name,
            "Completed sync: {} records in {} pages",
            self.stats.records_synced,
            self.stats.pages_fetched
        );
        emit(&Message::info(format!(
            "Completed sync for {}: {} partitions",
            stream.name,
            self.config.divisions.len()
        )))
    }

    /// Sync several streams in order, handing every message to `emit`
    pub async fn sync_streams<F>(&mut self, streams: &[&StreamDefinition], mut emit: F) -> Result<()>
    where
        F: FnMut(&Message) -> Result<()>,
    {
        for stream in streams {
            self.sync_stream(stream, &mut emit).await?;
        }
        self.state.checkpoint().await
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }
}

#[cfg(test)]
mod tests;
