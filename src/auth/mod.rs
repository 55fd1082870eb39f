//! Authentication module
//!
//! OAuth2 refresh-token flow against the accounting platform's token endpoint.
//!
//! The `Authenticator` keeps the current `AuthSession`, refreshes it under a
//! single write lock, and writes every new token pair to a `TokenStore`.

mod authenticator;
mod store;
mod types;

pub use authenticator::{Authenticator, OAuthConfig};
pub use store::{ObjectTokenStore, TokenStore};
pub use types::{
    parse_expires_in, AuthSession, RefreshOutcome, TokenSet, DEFAULT_EXPIRATION,
    RATE_LIMIT_NOT_EXPIRED,
};
