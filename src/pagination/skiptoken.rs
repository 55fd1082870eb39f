//! `$skiptoken` pagination over Atom feed links
//!
//! The upstream puts the continuation cursor at the end of the `next` link's
//! query string. A feed whose `link` is a single element (not a list) is
//! treated as exhausted, even if that link is a `next` link.

use super::types::{NextPage, PaginationState};
use crate::decode::{Feed, LinkSet};
use tracing::{debug, warn};

/// Link relation that points at the next page
pub const NEXT_REL: &str = "next";

/// Paginator following the feed's `next` link
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedPaginator;

impl FeedPaginator {
    /// Check if the feed announces another page
    pub fn has_more(feed: &Feed) -> bool {
        match feed.links() {
            LinkSet::Many(links) => links.iter().any(|link| link.rel == NEXT_REL),
            LinkSet::Single(_) | LinkSet::None => false,
        }
    }

    /// Continuation token of the feed's `next` link
    pub fn next_token(feed: &Feed) -> Option<String> {
        let LinkSet::Many(links) = feed.links() else {
            return None;
        };
        links
            .iter()
            .find(|link| link.rel == NEXT_REL)
            .and_then(|link| extract_skiptoken(&link.href))
    }

    /// Process one page and update the state
    pub fn process_page(
        feed: &Feed,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_fetched(records_count as u64);

        if !Self::has_more(feed) {
            state.mark_done();
            return NextPage::Done;
        }

        match Self::next_token(feed) {
            Some(token) if state.skiptoken.as_deref() == Some(token.as_str()) => {
                warn!("Next link repeats skiptoken {token}; stopping");
                state.mark_done();
                NextPage::Done
            }
            Some(token) => {
                debug!(page = state.page + 1, "Following next link");
                state.advance(token.clone());
                NextPage::with_skiptoken(token)
            }
            None => {
                warn!("Next link without a continuation token; stopping");
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

/// Value after the final `=` of the last query parameter, percent-decoded
pub fn extract_skiptoken(href: &str) -> Option<String> {
    let last_param = href.rsplit('&').next().unwrap_or(href);
    let raw = last_param.rsplit('=').next().unwrap_or(last_param);
    if raw.is_empty() {
        return None;
    }

    let decoded: String = url::form_urlencoded::parse(format!("t={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| raw.to_string());
    (!decoded.is_empty()).then_some(decoded)
}
