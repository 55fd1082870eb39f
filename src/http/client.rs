//! Authenticated feed client
//!
//! Every data request goes through [`HttpClient::get_feed`]:
//! - rate limited with a shared token bucket
//! - bearer token from the shared authenticator
//! - a 401 triggers one refresh and one retry
//! - transport timeouts and connection errors are retried once
//! - any other failure status is fatal and carries the upstream body

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::retry::RetryPolicy;
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Media type of the upstream feeds
pub const ATOM_MEDIA_TYPE: &str = "application/atom+xml";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL; relative paths are appended to it
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy for transport failures
    pub retry: RetryPolicy,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::single_retry(),
            rate_limit: Some(RateLimiterConfig::default()),
            user_agent: format!("solidafy-exact/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the transport retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client for the upstream feed API
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Arc<Authenticator>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a client that authenticates with the shared authenticator
    pub fn new(config: HttpClientConfig, authenticator: Arc<Authenticator>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator,
            rate_limiter,
        })
    }

    /// Get the shared authenticator
    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Fetch one feed page and return the raw body
    pub async fn get_feed(&self, url: &str, query: &[(String, String)]) -> Result<Bytes> {
        let full_url = self.build_url(url);
        let retry = &self.config.retry;

        let mut token = self.authenticator.bearer_token().await?;
        let mut reauthorized = false;
        let mut attempt = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let request = self
                .client
                .get(&full_url)
                .header(ACCEPT, ATOM_MEDIA_TYPE)
                .bearer_auth(&token)
                .query(query)
                .timeout(self.config.timeout);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let err = self.transport_error(e);
                    if err.is_retryable() && retry.should_retry(attempt) {
                        let delay = retry.delay(attempt);
                        warn!(
                            "Request to {full_url} failed ({err}), attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            retry.max_attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !reauthorized {
                info!("Received 401 from {full_url}, refreshing token and retrying once");
                token = self.authenticator.refresh_after_unauthorized(&token).await?;
                reauthorized = true;
                continue;
            }

            if !status.is_success() {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => format!("<failed to read response body: {e}>"),
                };
                return Err(Error::upstream(status.as_u16(), full_url, body));
            }

            let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
            debug!("GET {full_url} returned {} bytes", body.len());
            return Ok(body);
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
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

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("authenticator", &self.authenticator)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
