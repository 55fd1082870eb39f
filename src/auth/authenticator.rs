//! Authenticator implementation
//!
//! Owns the token pair for one upstream connection profile. Every fetcher
//! shares a single `Arc<Authenticator>`; refreshes happen under the session
//! write lock so concurrent callers wait for the one refresh in flight.

use super::store::TokenStore;
use super::types::{
    parse_expires_in, AuthSession, RefreshOutcome, TokenSet, RATE_LIMIT_NOT_EXPIRED,
};
use crate::error::{Error, Result};
use crate::http::RetryPolicy;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long to trust the current token after the endpoint refused a refresh
const RATE_LIMIT_GRACE_SECONDS: i64 = 60;

/// OAuth client settings for the refresh-token grant
#[derive(Clone)]
pub struct OAuthConfig {
    /// Token endpoint URL
    pub token_url: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Timeout for a single token request
    pub timeout: Duration,
    /// Retry policy for transient token endpoint failures
    pub retry: RetryPolicy,
}

impl OAuthConfig {
    /// Create a config with the default timeout and retry policy
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::token_refresh(),
        }
    }

    /// Set the token request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Authenticator handles bearer tokens and their refresh
pub struct Authenticator {
    /// OAuth client settings
    config: OAuthConfig,
    /// Where the token pair is persisted
    store: Arc<dyn TokenStore>,
    /// Current session
    session: RwLock<AuthSession>,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Load the token pair from the store and build an authenticator
    pub async fn load(config: OAuthConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::load_with_client(config, store, Client::new()).await
    }

    /// Load the token pair using a custom HTTP client
    pub async fn load_with_client(
        config: OAuthConfig,
        store: Arc<dyn TokenStore>,
        http_client: Client,
    ) -> Result<Self> {
        let tokens = store.load().await?;
        info!(
            location = %store.location(),
            last_refreshed = ?tokens.last_refreshed,
            "Loaded OAuth tokens"
        );
        Ok(Self {
            config,
            store,
            session: RwLock::new(AuthSession::from_stored(tokens)),
            http_client,
        })
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn bearer_token(&self) -> Result<String> {
        {
            let session = self.session.read().await;
            if session.is_valid() {
                return Ok(session.access_token().to_string());
            }
        }

        let mut session = self.session.write().await;

        // Another task may have refreshed while we waited for the lock
        if session.is_valid() {
            return Ok(session.access_token().to_string());
        }

        self.refresh_locked(&mut session).await.into_result()?;
        Ok(session.access_token().to_string())
    }

    /// Refresh after the API rejected `stale_token` with 401.
    ///
    /// If the session already holds a different token, someone else refreshed
    /// in the meantime and that token is returned without another refresh.
    pub async fn refresh_after_unauthorized(&self, stale_token: &str) -> Result<String> {
        let mut session = self.session.write().await;
        if session.access_token() != stale_token {
            debug!("Token already replaced by a concurrent refresh");
            return Ok(session.access_token().to_string());
        }

        self.refresh_locked(&mut session).await.into_result()?;
        Ok(session.access_token().to_string())
    }

    /// Run the refresh-token grant now
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut session = self.session.write().await;
        self.refresh_locked(&mut session).await
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> AuthSession {
        self.session.read().await.clone()
    }

    /// Current token pair
    pub async fn tokens(&self) -> TokenSet {
        self.session.read().await.tokens().clone()
    }

    /// Get the OAuth client settings
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Refresh with retries; the caller holds the session write lock
    async fn refresh_locked(&self, session: &mut AuthSession) -> RefreshOutcome {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let refresh_token = session.tokens().refresh_token.clone();
            match self.request_grant(&refresh_token).await {
                Err(e) if e.is_retryable() && retry.should_retry(attempt) => {
                    let delay = retry.delay(attempt);
                    warn!(
                        "Token refresh failed ({e}), attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        retry.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return RefreshOutcome::Failed(e),
                Ok(Grant::NotExpired) => {
                    info!("Token endpoint reports the access token has not expired; keeping it");
                    session.trust_until(
                        Utc::now() + chrono::Duration::seconds(RATE_LIMIT_GRACE_SECONDS),
                    );
                    return RefreshOutcome::RateLimitedNoOp;
                }
                Ok(Grant::Issued { tokens, expires_in }) => {
                    return self.commit(session, tokens, expires_in).await;
                }
            }
        }
    }

    /// Replace the session and persist the new pair
    async fn commit(
        &self,
        session: &mut AuthSession,
        tokens: TokenSet,
        expires_in: Option<Duration>,
    ) -> RefreshOutcome {
        if expires_in.is_none() {
            debug!("No token lifetime in refresh response; token treated as non-expiring");
        }
        *session = AuthSession::refreshed(tokens.clone(), expires_in);
        info!("OAuth authorization attempt was successful");

        match self.store.save(&tokens).await {
            Ok(()) => RefreshOutcome::Refreshed(tokens),
            Err(e) => RefreshOutcome::Failed(e),
        }
    }

    /// One refresh-token grant request
    async fn request_grant(&self, refresh_token: &str) -> Result<Grant> {
        let request_time = Utc::now();
        let form = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&form)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::empty_response(format!("failed to read body: {e}")))?;

        let json: Value = serde_json::from_str(&body).map_err(|_| {
            Error::empty_response(format!(
                "HTTP {} with a body that is not JSON ({} bytes)",
                status.as_u16(),
                body.len()
            ))
        })?;

        if json.get("error_description").and_then(Value::as_str) == Some(RATE_LIMIT_NOT_EXPIRED) {
            return Ok(Grant::NotExpired);
        }

        if !status.is_success() {
            return Err(Error::AuthFailed {
                status: status.as_u16(),
                body,
            });
        }

        let (Some(access_token), Some(refresh_token)) = (
            json.get("access_token").and_then(Value::as_str),
            json.get("refresh_token").and_then(Value::as_str),
        ) else {
            return Err(Error::AuthFailed {
                status: status.as_u16(),
                body: format!("token response without access_token/refresh_token: {body}"),
            });
        };

        Ok(Grant::Issued {
            tokens: TokenSet::new(access_token, refresh_token, request_time),
            expires_in: parse_expires_in(&json),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            Error::Http(e)
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("store", &self.store.location())
            .finish_non_exhaustive()
    }
}

/// What the token endpoint answered
enum Grant {
    Issued {
        tokens: TokenSet,
        expires_in: Option<Duration>,
    },
    NotExpired,
}
