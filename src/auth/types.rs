//! Token and session types
//!
//! `TokenSet` is the persisted shape; `AuthSession` is the in-memory view the
//! authenticator keeps between requests.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Lifetime assumed when the token endpoint does not report one
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(600);

/// Body text the token endpoint uses when asked to refresh a still-valid token
pub const RATE_LIMIT_NOT_EXPIRED: &str = "Rate limit exceeded: access_token not expired";

/// Refresh this long before the computed expiry
const EXPIRY_BUFFER_SECONDS: i64 = 30;

/// OAuth token pair as stored in the remote token object
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API requests
    pub access_token: String,
    /// Single-use refresh token; rotated by every successful refresh
    pub refresh_token: String,
    /// When the pair was obtained. Older token files do not carry it.
    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a token set refreshed at the given instant
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        last_refreshed: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            last_refreshed: Some(last_refreshed),
        }
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("last_refreshed", &self.last_refreshed)
            .finish()
    }
}

/// In-memory authentication state shared by every fetcher using one authenticator
#[derive(Clone)]
pub struct AuthSession {
    tokens: TokenSet,
    /// Token lifetime; `None` means the token never expires
    expires_in: Option<Duration>,
    /// Set after a rate-limited refresh: the upstream vouched for the current token
    trusted_until: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Session for a token pair read from the store, assumed to carry the default lifetime
    pub fn from_stored(tokens: TokenSet) -> Self {
        Self {
            tokens,
            expires_in: Some(DEFAULT_EXPIRATION),
            trusted_until: None,
        }
    }

    /// Session for a freshly refreshed token pair
    pub fn refreshed(tokens: TokenSet, expires_in: Option<Duration>) -> Self {
        Self {
            tokens,
            expires_in,
            trusted_until: None,
        }
    }

    /// Current access token
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Current token pair
    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Token lifetime, if it expires
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// When the current pair was obtained
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.tokens.last_refreshed
    }

    /// Trust the current token until `until` without touching the token pair
    pub fn trust_until(&mut self, until: DateTime<Utc>) {
        self.trusted_until = Some(until);
    }

    /// Check whether the access token can still be used at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.trusted_until.is_some_and(|until| now < until) {
            return true;
        }
        let Some(last_refreshed) = self.tokens.last_refreshed else {
            return false;
        };
        let Some(expires_in) = self.expires_in else {
            return true;
        };
        let Some(expires_at) = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|lifetime| last_refreshed.checked_add_signed(lifetime))
        else {
            return true;
        };
        now + chrono::Duration::seconds(EXPIRY_BUFFER_SECONDS) < expires_at
    }

    /// Check whether the access token can still be used now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("tokens", &self.tokens)
            .field("expires_in", &self.expires_in)
            .field("trusted_until", &self.trusted_until)
            .finish()
    }
}

/// Result of one refresh run
#[derive(Debug)]
pub enum RefreshOutcome {
    /// New token pair obtained and persisted
    Refreshed(TokenSet),
    /// Upstream refused because the current token has not expired yet
    RateLimitedNoOp,
    /// Refresh failed; terminal for this attempt
    Failed(Error),
}

impl RefreshOutcome {
    /// Check if a new token pair was obtained
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }

    /// Check if this was the rate-limited no-op
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitedNoOp)
    }

    /// Turn `Failed` into an error, keeping the other outcomes
    pub fn into_result(self) -> crate::error::Result<Self> {
        match self {
            Self::Failed(e) => Err(e),
            other => Ok(other),
        }
    }
}

/// Token lifetime reported by a refresh response.
///
/// A missing `expires_in` falls back to [`DEFAULT_EXPIRATION`]; an explicit
/// `null`, zero or empty value means the token does not expire.
pub fn parse_expires_in(body: &Value) -> Option<Duration> {
    match body.get("expires_in") {
        None => Some(DEFAULT_EXPIRATION),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => match s.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => Some(DEFAULT_EXPIRATION),
        },
        Some(_) => None,
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;
    use serde_json::json;

    fn tokens_at(at: DateTime<Utc>) -> TokenSet {
        TokenSet::new("access", "refresh", at)
    }

    #[test]
    fn test_session_valid_within_lifetime() {
        let session = AuthSession::refreshed(tokens_at(Utc::now()), Some(DEFAULT_EXPIRATION));
        assert!(session.is_valid());
    }

    #[test]
    fn test_session_expired_after_lifetime() {
        let at = Utc::now() - chrono::Duration::seconds(700);
        let session = AuthSession::refreshed(tokens_at(at), Some(DEFAULT_EXPIRATION));
        assert!(!session.is_valid());
    }

    #[test]
    fn test_session_expiry_buffer() {
        let at = Utc::now() - chrono::Duration::seconds(580);
        let session = AuthSession::refreshed(tokens_at(at), Some(DEFAULT_EXPIRATION));
        assert!(!session.is_valid());
    }

    #[test]
    fn test_session_without_expiry_never_expires() {
        let at = Utc::now() - chrono::Duration::days(30);
        let session = AuthSession::refreshed(tokens_at(at), None);
        assert!(session.is_valid());
    }

    #[test]
    fn test_session_without_refresh_time_is_invalid() {
        let tokens = TokenSet {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            last_refreshed: None,
        };
        assert!(!AuthSession::from_stored(tokens).is_valid());
    }

    #[test]
    fn test_trusted_session_is_valid() {
        let at = Utc::now() - chrono::Duration::seconds(900);
        let mut session = AuthSession::from_stored(tokens_at(at));
        assert!(!session.is_valid());
        session.trust_until(Utc::now() + chrono::Duration::seconds(60));
        assert!(session.is_valid());
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in(&json!({})), Some(DEFAULT_EXPIRATION));
        assert_eq!(
            parse_expires_in(&json!({"expires_in": "600"})),
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            parse_expires_in(&json!({"expires_in": 3600})),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(parse_expires_in(&json!({"expires_in": null})), None);
        assert_eq!(parse_expires_in(&json!({"expires_in": 0})), None);
        assert_eq!(parse_expires_in(&json!({"expires_in": ""})), None);
    }

    #[test]
    fn test_token_set_debug_is_redacted() {
        let debug = format!("{:?}", tokens_at(Utc::now()));
        assert!(!debug.contains("access\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_token_set_json_shape() {
        let tokens: TokenSet = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "last_refreshed": "2024-03-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(
            tokens.last_refreshed.unwrap().to_rfc3339(),
            "2024-03-01T12:00:00+00:00"
        );

        let legacy: TokenSet =
            serde_json::from_value(json!({"access_token": "a", "refresh_token": "r"})).unwrap();
        assert!(legacy.last_refreshed.is_none());
    }
}
