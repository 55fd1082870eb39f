//! Pagination module
//!
//! # Overview
//!
//! Feeds announce a further page with a `next` link whose trailing query value
//! is the `$skiptoken` for the following request. [`FeedPaginator`] reads that
//! link; [`PageProfile`] records the page size a stream is served with.

mod skiptoken;
mod types;

pub use skiptoken::{extract_skiptoken, FeedPaginator, NEXT_REL};
pub use types::{NextPage, PageProfile, PaginationState};
