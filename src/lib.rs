// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Exact
//!
//! Extractor for the Exact Online accounting API. Pulls Atom/XML feeds per
//! division, turns their OData-typed entries into flat records and tracks a
//! replication cursor per stream and division.
//!
//! ## Features
//!
//! - **OAuth2 Refresh**: Single-flight token refresh with remote token persistence
//! - **Feed Parsing**: Recovering XML parser with a byte-order-mark fallback
//! - **Skiptoken Pagination**: Follows the feed's `next` link
//! - **Incremental Sync**: Row-version and `Modified` cursors that only move forward
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_exact::auth::{Authenticator, OAuthConfig, ObjectTokenStore};
//! use solidafy_exact::engine::{StreamFetcher, SyncConfig, SyncEngine};
//! use solidafy_exact::http::{HttpClient, HttpClientConfig};
//! use solidafy_exact::schema::find_stream;
//! use solidafy_exact::state::StateManager;
//! use std::sync::Arc;
//!
//! let store = Arc::new(ObjectTokenStore::parse("s3://bucket/datajobs/exactonline")?);
//! let oauth = OAuthConfig::new(TOKEN_URL, "client-id", "client-secret");
//! let auth = Arc::new(Authenticator::load(oauth, store).await?);
//!
//! let config = HttpClientConfig::builder().base_url(BASE_URL).build();
//! let fetcher = StreamFetcher::new(Arc::new(HttpClient::new(config, auth)?));
//! let mut engine = SyncEngine::new(fetcher, StateManager::new("state.json"))
//!     .with_config(SyncConfig::new().with_divisions(["3490573"]));
//!
//! engine
//!     .sync_stream(find_stream("deleted")?, |message| {
//!         if let Some(line) = message.to_singer_line()? {
//!             println!("{line}");
//!         }
//!         Ok(())
//!     })
//!     .await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┬───────────┬───────────┬────────────┬───────────┐
//! │   Auth   │   HTTP    │  Decode   │ Pagination │ Normalize │
//! ├──────────┼───────────┼───────────┼────────────┼───────────┤
//! │ Refresh  │ GET feed  │ XML tree  │ next link  │ OData     │
//! │ Store    │ 401 retry │ Recovery  │ skiptoken  │ coercion  │
//! └──────────┴───────────┴───────────┴────────────┴───────────┘
//!                              │
//!              Engine (fetcher, divisions, state)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// OAuth2 refresh flow and token persistence
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Atom/XML feed decoding
pub mod decode;

/// Skiptoken pagination
pub mod pagination;

/// Stream catalog and JSON schemas
pub mod schema;

/// OData record normalization
pub mod normalize;

/// State management and checkpointing
pub mod state;

/// Main execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use auth::{Authenticator, OAuthConfig, ObjectTokenStore, RefreshOutcome, TokenSet, TokenStore};
pub use config::TapConfig;
pub use decode::{Feed, FeedParser};
pub use engine::{Message, StreamFetcher, SyncConfig, SyncEngine};
pub use normalize::{FieldValue, NormalizedRecord};
pub use state::{ReplicationCursor, StateManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
