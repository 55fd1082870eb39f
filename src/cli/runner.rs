//! CLI runner - executes commands

use crate::auth::{Authenticator, OAuthConfig, ObjectTokenStore};
use crate::cli::commands::{parse_stream_list, Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{Message, StreamFetcher, SyncConfig, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig};
use crate::schema::{all_streams, select_streams, StreamDefinition};
use crate::state::StateManager;
use crate::types::{JsonValue, LogLevel};
use serde_json::json;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
    shutdown: Arc<AtomicBool>,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops a running sync between pages once set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check { config_json } => self.check(config_json.as_deref()).await,
            Commands::Discover => self.discover(),
            Commands::Read {
                streams,
                config_json,
            } => self.read(streams.as_deref(), config_json.as_deref()).await,
            Commands::Streams => self.streams(),
        }
    }

    /// Load and validate configuration; inline JSON takes precedence over the file
    fn load_config(&self, inline: Option<&str>) -> Result<TapConfig> {
        let config = if let Some(json_str) = inline {
            TapConfig::from_json(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)?
        } else {
            return Err(Error::config(
                "Configuration not specified (use -C or --config-json)",
            ));
        };

        config.validate()?;
        debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Load the persisted tokens into the shared authenticator
    async fn build_authenticator(config: &TapConfig) -> Result<Arc<Authenticator>> {
        let location = config.token_store_url()?;
        let store = ObjectTokenStore::parse(&location)?;
        info!("Loading tokens from {} store", store.scheme());

        let oauth = OAuthConfig::new(&config.token_url, &config.client_id, &config.client_secret)
            .with_timeout(config.auth_timeout());
        Ok(Arc::new(Authenticator::load(oauth, Arc::new(store)).await?))
    }

    fn build_http_config(config: &TapConfig) -> HttpClientConfig {
        HttpClientConfig::builder()
            .base_url(&config.base_url)
            .timeout(config.request_timeout())
            .rate_limit(RateLimiterConfig::new(
                config.requests_per_second,
                config.burst_size,
            ))
            .build()
    }

    /// Check connection
    async fn check(&self, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        self.output_log(LogLevel::Info, "Checking token store and token endpoint");

        let status = match Self::build_authenticator(&config).await {
            Ok(auth) => auth.bearer_token().await.map(|_| ()),
            Err(e) => Err(e),
        };

        match status {
            Ok(()) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "SUCCEEDED",
                    "message": "Access token available"
                }
            })),
            Err(e) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "FAILED",
                    "message": format!("Connection failed: {e}")
                }
            })),
        }

        Ok(())
    }

    /// Print the catalog
    fn discover(&self) -> Result<()> {
        let streams: Vec<JsonValue> = all_streams().iter().map(catalog_entry).collect();
        self.output_message(&json!({
            "type": "CATALOG",
            "catalog": { "streams": streams }
        }));
        Ok(())
    }

    /// List stream names
    fn streams(&self) -> Result<()> {
        let names: Vec<&str> = all_streams().iter().map(|s| s.name).collect();
        self.output_message(&json!({
            "type": "STREAMS",
            "streams": names
        }));
        Ok(())
    }

    /// Read data
    async fn read(&self, streams: Option<&str>, config_json: Option<&str>) -> Result<()> {
        let start = Instant::now();
        let config = self.load_config(config_json)?;

        let wanted = streams
            .map(parse_stream_list)
            .unwrap_or_else(|| config.streams.clone());
        let selected = select_streams(Some(wanted.as_slice()))?;

        let auth = Self::build_authenticator(&config).await?;
        let client = Arc::new(HttpClient::new(Self::build_http_config(&config), auth)?);

        let fetcher = StreamFetcher::new(client)
            .with_start_date(config.start_date)
            .with_field_errors(config.field_errors)
            .with_shutdown(self.shutdown_flag());
        let sync_config = SyncConfig::new()
            .with_divisions(config.divisions.iter().cloned())
            .with_partition_concurrency(config.partition_concurrency);
        let state = self.load_state().context("Failed to load state")?;
        if !state.is_in_memory() {
            info!("Saving state to {}", state.path().display());
        }
        let mut engine = SyncEngine::new(fetcher, state).with_config(sync_config);

        info!(
            "Syncing {} streams over {} divisions",
            selected.len(),
            config.divisions.len()
        );

        let result = engine
            .sync_streams(&selected, |message| self.output_engine_message(message))
            .await;

        let stats = engine.stats();
        let summary = format!(
            "Sync finished: {} records ({} skipped) in {} pages across {} streams, {}ms",
            stats.records_synced,
            stats.records_skipped,
            stats.pages_fetched,
            stats.streams_synced,
            start.elapsed().as_millis()
        );

        match result {
            Ok(()) => {
                info!("{summary}");
                Ok(())
            }
            Err(e) => {
                error!("{summary}; stopped by: {e}");
                Err(e)
            }
        }
    }

    fn output_message(&self, msg: &JsonValue) {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg),
            OutputFormat::Pretty => serde_json::to_string_pretty(msg),
        };
        match text {
            Ok(text) => println!("{text}"),
            Err(e) => error!("Failed to serialize output message: {e}"),
        }
    }

    fn output_log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
    }

    /// Write one engine message: Singer messages to stdout, logs to the log
    fn output_engine_message(&self, message: &Message) -> Result<()> {
        if let Message::Log { level, message } = message {
            self.output_log(*level, message);
            return Ok(());
        }

        if self.cli.format == OutputFormat::Pretty {
            if let Some(value) = message.to_singer() {
                self.output_message(&value);
            }
            return Ok(());
        }

        if let Some(line) = message.to_singer_line()? {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{line}")?;
            if message.is_state() {
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Catalog entry of one stream
fn catalog_entry(stream: &StreamDefinition) -> JsonValue {
    json!({
        "stream": stream.name,
        "tap_stream_id": stream.name,
        "schema": stream.json_schema().to_json(),
        "key_properties": stream.primary_keys,
        "replication_key": stream.replication_key(),
        "replication_method": if stream.replication_key().is_some() { "INCREMENTAL" } else { "FULL_TABLE" },
        "metadata": {
            "path": stream.path,
            "page_size": stream.profile.page_size(),
        },
    })
}
