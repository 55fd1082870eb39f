//! HTTP client module
//!
//! Provides the authenticated feed client with retry and rate limiting.
//!
//! # Features
//!
//! - **401 Handling**: One token refresh and one retry per request
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Retry Policies**: Constant and exponential backoff

mod client;
mod rate_limit;
mod retry;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, ATOM_MEDIA_TYPE};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;
