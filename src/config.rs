//! Tap configuration
//!
//! The configuration file supplies OAuth client credentials, the location of
//! the persisted token object, the divisions to extract and the start date for
//! date-windowed streams. JSON and YAML files are both accepted.

use crate::error::{Error, Result};
use crate::normalize::parse_timestamp;
use crate::types::{ErrorStrategy, OptionStringExt};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://start.exactonline.nl/api/v1";

/// Default OAuth token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://start.exactonline.nl/api/oauth2/token";

/// File name of the token object below the token store location
pub const TOKENS_FILE: &str = "tokens.json";

/// Complete tap configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Lower bound for `Modified`-windowed streams without saved state
    #[serde(default, deserialize_with = "deserialize_start_date")]
    pub start_date: Option<NaiveDateTime>,

    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Location of the persisted token object (`s3://bucket/prefix`, `memory://`, a directory...)
    #[serde(default)]
    pub token_store: Option<String>,

    /// Legacy S3 bucket holding `tokens.json`
    #[serde(default)]
    pub tokens_s3_bucket: Option<String>,

    /// Legacy S3 key prefix holding `tokens.json`
    #[serde(default)]
    pub tokens_s3_key: Option<String>,

    /// Divisions (sub-accounts) to extract
    #[serde(default, deserialize_with = "deserialize_divisions")]
    pub divisions: Vec<String>,

    /// API root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Timeout for data requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for token requests
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Sustained request rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Request burst allowance
    #[serde(default = "default_burst")]
    pub burst_size: u32,

    /// Number of divisions fetched at the same time
    #[serde(default = "default_partition_concurrency")]
    pub partition_concurrency: usize,

    /// What to do with a record whose field cannot be coerced
    #[serde(default)]
    pub field_errors: ErrorStrategy,

    /// Streams to sync (all when empty)
    #[serde(default)]
    pub streams: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_auth_timeout() -> u64 {
    60
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_burst() -> u32 {
    60
}

fn default_partition_concurrency() -> usize {
    1
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            client_id: String::new(),
            client_secret: String::new(),
            token_store: None,
            tokens_s3_bucket: None,
            tokens_s3_key: None,
            divisions: Vec::new(),
            base_url: default_base_url(),
            token_url: default_token_url(),
            request_timeout_secs: default_request_timeout(),
            auth_timeout_secs: default_auth_timeout(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst(),
            partition_concurrency: default_partition_concurrency(),
            field_errors: ErrorStrategy::default(),
            streams: Vec::new(),
        }
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("start_date", &self.start_date)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_store", &self.token_store_url().ok())
            .field("divisions", &self.divisions)
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("partition_concurrency", &self.partition_concurrency)
            .field("field_errors", &self.field_errors)
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}

impl TapConfig {
    /// Load configuration from a file; `.yaml`/`.yml` are read as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file {}: {e}", path.display())))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.client_id.clone().none_if_empty().is_none() {
            return Err(Error::missing_field("client_id"));
        }
        if self.client_secret.clone().none_if_empty().is_none() {
            return Err(Error::missing_field("client_secret"));
        }
        self.token_store_url()?;
        if self.divisions.is_empty() {
            return Err(Error::missing_field("divisions"));
        }
        if let Some(empty) = self.divisions.iter().find(|d| d.trim().is_empty()) {
            return Err(Error::invalid_value(
                "divisions",
                format!("division identifier '{empty}' is empty"),
            ));
        }
        if self.partition_concurrency == 0 {
            return Err(Error::invalid_value(
                "partition_concurrency",
                "must be at least 1",
            ));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        url::Url::parse(&self.token_url)
            .map_err(|e| Error::invalid_value("token_url", e.to_string()))?;
        Ok(())
    }

    /// Resolve the token store location, honouring the legacy S3 bucket/key pair
    pub fn token_store_url(&self) -> Result<String> {
        if let Some(url) = self.token_store.clone().none_if_empty() {
            return Ok(url);
        }
        match (&self.tokens_s3_bucket, &self.tokens_s3_key) {
            (Some(bucket), Some(key)) if !bucket.is_empty() => Ok(format!(
                "s3://{bucket}/{}",
                key.trim_matches('/')
            )),
            (Some(bucket), None) if !bucket.is_empty() => Ok(format!("s3://{bucket}")),
            _ => Err(Error::missing_field("token_store")),
        }
    }

    /// Timeout for data requests
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for token requests
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

/// Parse a start date given either as `YYYY-MM-DD` or an ISO-8601 datetime
pub fn parse_start_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Some(dt) = parse_timestamp(value) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(Error::invalid_value(
        "start_date",
        format!("'{value}' is neither a date nor a datetime"),
    ))
}

fn deserialize_start_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.none_if_empty() {
        Some(value) => parse_start_date(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Division ids show up as numbers or strings depending on who wrote the file
fn deserialize_divisions<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    raw.into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "division must be a string or number, got {other}"
            ))),
        })
        .collect()
}
