//! Error types for Solidafy Exact
//!
//! This module defines the error hierarchy for the entire connector.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for Solidafy Exact
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Token Store Errors
    // ============================================================================
    #[error("Token object not found at {location}: {message}")]
    TokenNotFound { location: String, message: String },

    #[error("Failed to persist tokens to {location}: {message}")]
    TokenPersistence { location: String, message: String },

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Token endpoint returned an unreadable response: {message}")]
    EmptyResponse { message: String },

    #[error("OAuth refresh failed with HTTP {status}: {body}")]
    AuthFailed { status: u16, body: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream request to {url} failed with HTTP {status}: {body}")]
    UpstreamRequest {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to parse feed: {message}")]
    UnparsableFeed { message: String },

    #[error("Malformed value for field '{field}': '{value}' ({message})")]
    MalformedField {
        field: String,
        value: String,
        message: String,
    },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Connector Errors
    // ============================================================================
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    #[error("Sync interrupted during stream '{stream}' for division {division}")]
    Interrupted { stream: String, division: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a token-not-found error
    pub fn token_not_found(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenNotFound {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a token persistence error
    pub fn token_persistence(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenPersistence {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an empty-response error
    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::EmptyResponse {
            message: message.into(),
        }
    }

    /// Create an upstream request error
    pub fn upstream(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::UpstreamRequest {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Create an unparsable feed error
    pub fn unparsable_feed(message: impl Into<String>) -> Self {
        Self::UnparsableFeed {
            message: message.into(),
        }
    }

    /// Create a malformed field error
    pub fn malformed_field(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedField {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error is transient and worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::EmptyResponse { .. } | Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error is the per-record `MalformedField` kind
    pub fn is_record_level(&self) -> bool {
        matches!(self, Error::MalformedField { .. })
    }
}

/// Result type alias for Solidafy Exact
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
