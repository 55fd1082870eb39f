//! Remote token persistence
//!
//! The token pair lives in a single JSON object (`tokens.json`) in a bucket or
//! directory. Refresh tokens are single use, so every refresh must be written
//! back before the next run starts.

use super::types::TokenSet;
use crate::config::TOKENS_FILE;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Durable storage for the OAuth token pair
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the token pair; `TokenNotFound` when missing or unreadable
    async fn load(&self) -> Result<TokenSet>;

    /// Overwrite the stored token pair; `TokenPersistence` on failure
    async fn save(&self, tokens: &TokenSet) -> Result<()>;

    /// Human-readable location for diagnostics
    fn location(&self) -> String;
}

/// Token store backed by an `object_store` bucket, container or directory
#[derive(Debug, Clone)]
pub struct ObjectTokenStore {
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    scheme: String,
}

impl ObjectTokenStore {
    /// Parse a token store URL
    ///
    /// Supported formats:
    /// - `s3://bucket/prefix` - AWS S3
    /// - `r2://bucket/prefix` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/prefix` - Google Cloud Storage
    /// - `az://container/prefix` - Azure Blob Storage
    /// - `memory://prefix` - process-local store
    /// - `/local/dir` or `file:///local/dir` - local filesystem
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::parse_s3(rest, false)
        } else if let Some(rest) = url.strip_prefix("r2://") {
            Self::parse_s3(rest, true)
        } else if let Some(rest) = url.strip_prefix("gs://") {
            let (bucket, prefix) = split_bucket(rest);
            let store = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;
            Ok(Self::with_store(Arc::new(store), &prefix, "gs"))
        } else if let Some(rest) = url.strip_prefix("az://") {
            let (container, prefix) = split_bucket(rest);
            let store = MicrosoftAzureBuilder::from_env()
                .with_container_name(container)
                .build()
                .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;
            Ok(Self::with_store(Arc::new(store), &prefix, "az"))
        } else if let Some(rest) = url.strip_prefix("memory://") {
            Ok(Self::with_store(Arc::new(InMemory::new()), rest, "memory"))
        } else {
            Self::parse_local(url.strip_prefix("file://").unwrap_or(url))
        }
    }

    /// Process-local store, mainly for tests
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemory::new()), "", "memory")
    }

    /// Wrap an existing object store; the token object lives at `<prefix>/tokens.json`
    pub fn with_store(store: Arc<dyn ObjectStore>, prefix: &str, scheme: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let path = if prefix.is_empty() {
            ObjectPath::from(TOKENS_FILE)
        } else {
            ObjectPath::from(format!("{prefix}/{TOKENS_FILE}"))
        };
        Self {
            store,
            path,
            scheme: scheme.to_string(),
        }
    }

    fn parse_s3(rest: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = split_bucket(rest);

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;
        Ok(Self::with_store(Arc::new(store), &prefix, scheme))
    }

    fn parse_local(dir: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::config(format!("Failed to create directory {dir}: {e}")))?;
        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;
        Ok(Self::with_store(Arc::new(store), "", "file"))
    }

    /// Get the scheme (s3, r2, gs, az, memory, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}

#[async_trait]
impl TokenStore for ObjectTokenStore {
    async fn load(&self) -> Result<TokenSet> {
        let location = self.location();
        let result = self.store.get(&self.path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::token_not_found(&location, "object does not exist")
            }
            other => Error::token_persistence(&location, other.to_string()),
        })?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| Error::token_persistence(&location, e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::token_not_found(&location, format!("malformed token JSON: {e}")))
    }

    async fn save(&self, tokens: &TokenSet) -> Result<()> {
        let location = self.location();
        let body = serde_json::to_vec_pretty(tokens)
            .map_err(|e| Error::token_persistence(&location, e.to_string()))?;

        self.store
            .put(&self.path, Bytes::from(body).into())
            .await
            .map_err(|e| Error::token_persistence(&location, e.to_string()))?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("{}://{}", self.scheme, self.path)
    }
}

fn split_bucket(rest: &str) -> (&str, String) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx + 1..].to_string()),
        None => (rest, String::new()),
    }
}
