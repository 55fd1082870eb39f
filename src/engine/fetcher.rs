//! Page loop for one stream in one division

use super::types::PartitionOutput;
use crate::decode::FeedParser;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::normalize::{normalize, reconcile, NormalizedRecord};
use crate::pagination::{FeedPaginator, NextPage, PaginationState};
use crate::schema::{Replication, StreamDefinition};
use crate::state::ReplicationCursor;
use crate::types::ErrorStrategy;
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Row version that means "from the beginning"
pub const INITIAL_ROW_VERSION: i64 = 1;

/// Format of datetime literals in `$filter`
pub const FILTER_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fetches every page of a stream for one division
#[derive(Debug, Clone)]
pub struct StreamFetcher {
    client: Arc<HttpClient>,
    start_date: Option<NaiveDateTime>,
    field_errors: ErrorStrategy,
    shutdown: Arc<AtomicBool>,
}

impl StreamFetcher {
    /// Create a fetcher over a shared client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            start_date: None,
            field_errors: ErrorStrategy::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lower bound for `Modified` streams without a saved cursor
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<NaiveDateTime>) -> Self {
        self.start_date = start_date;
        self
    }

    /// What to do with records whose fields cannot be coerced
    #[must_use]
    pub fn with_field_errors(mut self, strategy: ErrorStrategy) -> Self {
        self.field_errors = strategy;
        self
    }

    /// Flag checked between pages; once set the fetch stops with `Interrupted`
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Shared shutdown flag
    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shutdown
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Query parameters for one page request
    pub fn query_params(
        &self,
        stream: &StreamDefinition,
        cursor: Option<ReplicationCursor>,
        skiptoken: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut params = vec![("$select".to_string(), stream.select())];
        if let Some(filter) = build_filter(stream.replication, cursor, self.start_date) {
            params.push(("$filter".to_string(), filter));
        }
        if let Some(token) = skiptoken {
            params.push(("$skiptoken".to_string(), token.to_string()));
        }
        params
    }

    /// Fetch all pages of `stream` in `division`, starting after `cursor`.
    ///
    /// Records come back in page order. The returned cursor is the larger of
    /// the starting cursor and every cursor value seen in the records.
    pub async fn fetch_partition(
        &self,
        stream: &StreamDefinition,
        division: &str,
        cursor: Option<ReplicationCursor>,
    ) -> Result<PartitionOutput> {
        let path = stream.partition_path(division);
        let mut pagination = PaginationState::new();
        let mut output = PartitionOutput {
            division: division.to_string(),
            records: Vec::new(),
            pages: 0,
            skipped: 0,
            cursor,
        };

        info!(
            stream = stream.name,
            division,
            profile = %stream.profile,
            "Fetching partition starting after {}",
            cursor.map_or_else(|| "<none>".to_string(), |c| c.to_string())
        );

        loop {
            if output.pages > 0 && self.is_shutdown() {
                warn!(stream = stream.name, division, "Shutdown requested between pages");
                return Err(Error::Interrupted {
                    stream: stream.name.to_string(),
                    division: division.to_string(),
                });
            }

            let params = self.query_params(stream, cursor, pagination.skiptoken.as_deref());
            let body = self.client.get_feed(&path, &params).await?;
            let feed = FeedParser::parse(&body)?;
            output.pages += 1;

            let entries = feed.entries();
            debug!(
                stream = stream.name,
                division,
                page = output.pages,
                "Page holds {} entries",
                entries.len()
            );

            for entry in &entries {
                let record = match normalize(entry) {
                    Ok(record) => reconcile(record, stream),
                    Err(e) if e.is_record_level() && self.field_errors == ErrorStrategy::Skip => {
                        warn!(stream = stream.name, division, "Skipping record: {e}");
                        output.skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                if let Some(seen) = record_cursor(stream.replication, &record) {
                    output.cursor = Some(match output.cursor {
                        Some(current) => current.max(seen),
                        None => seen,
                    });
                }
                output.records.push(record);
            }

            match FeedPaginator::process_page(&feed, entries.len(), &mut pagination) {
                NextPage::Continue { .. } => {}
                NextPage::Done => break,
            }
        }

        info!(
            stream = stream.name,
            division,
            "Fetched {} records in {} pages",
            output.records.len(),
            output.pages
        );

        Ok(output)
    }
}

/// `$filter` expression for a stream.
///
/// Row-version streams always filter on `Timestamp`; the starting value 1 is
/// written without the `L` suffix. `Modified` streams filter from the saved
/// cursor, else from the start date, else not at all.
pub fn build_filter(
    replication: Replication,
    cursor: Option<ReplicationCursor>,
    start_date: Option<NaiveDateTime>,
) -> Option<String> {
    match replication {
        Replication::RowVersion => {
            let version = match cursor {
                Some(ReplicationCursor::RowVersion(v)) => v,
                _ => INITIAL_ROW_VERSION,
            };
            Some(if version == INITIAL_ROW_VERSION {
                format!("Timestamp gt {version}")
            } else {
                format!("Timestamp gt {version}L")
            })
        }
        Replication::Modified => {
            let since = match cursor {
                Some(ReplicationCursor::Modified(ts)) => Some(ts),
                _ => start_date,
            }?;
            Some(format!(
                "Modified gt datetime'{}'",
                since.format(FILTER_DATETIME_FORMAT)
            ))
        }
        Replication::None => None,
    }
}

/// Cursor value carried by a record
pub fn record_cursor(
    replication: Replication,
    record: &NormalizedRecord,
) -> Option<ReplicationCursor> {
    let key = replication.key()?;
    let value = record.get(key)?;
    match replication {
        Replication::RowVersion => value.as_i64().map(ReplicationCursor::RowVersion),
        Replication::Modified => value.as_timestamp().map(ReplicationCursor::Modified),
        Replication::None => None,
    }
}
