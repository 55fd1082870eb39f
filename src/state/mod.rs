//! State management module
//!
//! Tracks one replication cursor per stream and division. State is
//! persisted between runs so incremental streams resume where they left off.
//!
//! # Overview
//!
//! - `State` holds stream and partition cursors
//! - `StateManager` persists it with atomic file writes
//! - Cursors only ever move forward

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{PartitionState, ReplicationCursor, State, StreamState};
