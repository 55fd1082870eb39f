//! Pagination types
//!
//! Defines page profiles and the per-partition pagination state.

use serde::{Deserialize, Serialize};

/// Page size profile of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageProfile {
    /// `/sync/` endpoints: large pages, row-version cursor, delete tracking
    Sync,
    /// Regular endpoints: small pages, full re-fetch every run
    Regular,
}

impl PageProfile {
    /// Records per page the upstream serves for this profile
    pub fn page_size(self) -> u32 {
        match self {
            Self::Sync => 1000,
            Self::Regular => 60,
        }
    }

    /// Profile name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Regular => "regular",
        }
    }
}

impl std::fmt::Display for PageProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Request the next page with this `$skiptoken`
    Continue {
        /// Continuation token
        skiptoken: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation
    pub fn with_skiptoken(skiptoken: impl Into<String>) -> Self {
        Self::Continue {
            skiptoken: skiptoken.into(),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages processed so far
    pub page: u32,
    /// Continuation token for the next request
    pub skiptoken: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
        self.skiptoken = None;
    }

    /// Move to the next page with the given token
    pub fn advance(&mut self, skiptoken: String) {
        self.page += 1;
        self.skiptoken = Some(skiptoken);
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: u64) {
        self.total_fetched += count;
    }
}
