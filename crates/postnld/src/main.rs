// # postnld - PostNL tracking daemon
//
// Thin integration layer around postnl-core. No tracking logic lives here.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the token store, API clients and state publisher
// 4. Setting up the config entry and running its update coordinator
//
// ## Configuration
//
// ### Account
// - `POSTNL_CLIENT_ID`: OAuth2 client id (required)
// - `POSTNL_REFRESH_TOKEN`: Refresh token used when no token is stored yet
// - `POSTNL_ENTRY_ID`: Config entry id (default: `default`)
//
// ### Options
// - `POSTNL_UPDATE_INTERVAL`: Polling interval in seconds (>= 30, default 90)
//
// ### Token Store
// - `POSTNL_TOKEN_STORE_TYPE`: Type of token store (file, memory)
// - `POSTNL_TOKEN_STORE_PATH`: Path to the store file (for file store)
//
// ### Output
// - `POSTNL_OUTPUT`: Where sensor state goes (log, json)
// - `POSTNL_LOG_LEVEL`: trace, debug, info, warn, error
//
// ### Endpoints (optional)
// - `POSTNL_GRAPHQL_URL`, `POSTNL_LOGIN_URL`, `POSTNL_JOUW_URL`
//
// ## Example
//
// ```bash
// export POSTNL_CLIENT_ID=your_client_id
// export POSTNL_REFRESH_TOKEN=your_refresh_token
// export POSTNL_TOKEN_STORE_TYPE=file
// export POSTNL_TOKEN_STORE_PATH=/var/lib/postnl/entries.json
// export POSTNL_OUTPUT=json
//
// postnld
// ```

mod publisher;

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use postnl_api::PostnlClients;
use postnl_core::config::{EndpointConfig, PostnlConfig, TokenStoreConfig};
use postnl_core::engine::CoordinatorEvent;
use postnl_core::options::{FlowResult, OptionsFlow};
use postnl_core::state::{FileTokenStoreFactory, MemoryTokenStoreFactory};
use postnl_core::traits::{StatePublisher, TokenStore, TokenStoreFactory};
use postnl_core::{ConfigEntry, EntryContext, Error, setup_entry, unload_entry};

use crate::publisher::{JsonLinesPublisher, LogPublisher};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Delay between setup attempts while the entry is not ready
const SETUP_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PostnlExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PostnlExitCode> for ExitCode {
    fn from(code: PostnlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    client_id: String,
    refresh_token: Option<String>,
    entry_id: String,
    update_interval: Option<String>,
    token_store_type: String,
    token_store_path: Option<String>,
    output: String,
    log_level: String,
    graphql_url: Option<String>,
    login_url: Option<String>,
    jouw_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: env::var("POSTNL_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("POSTNL_CLIENT_ID is required"))?,
            refresh_token: env::var("POSTNL_REFRESH_TOKEN").ok(),
            entry_id: env::var("POSTNL_ENTRY_ID").unwrap_or_else(|_| "default".to_string()),
            update_interval: env::var("POSTNL_UPDATE_INTERVAL").ok(),
            token_store_type: env::var("POSTNL_TOKEN_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            token_store_path: env::var("POSTNL_TOKEN_STORE_PATH").ok(),
            output: env::var("POSTNL_OUTPUT").unwrap_or_else(|_| "log".to_string()),
            log_level: env::var("POSTNL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            graphql_url: env::var("POSTNL_GRAPHQL_URL").ok(),
            login_url: env::var("POSTNL_LOGIN_URL").ok(),
            jouw_url: env::var("POSTNL_JOUW_URL").ok(),
        })
    }

    /// Validate the configuration
    ///
    /// Checks required fields, enumerations and the update interval. The
    /// assembled core configuration is validated as well.
    fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            anyhow::bail!(
                "POSTNL_CLIENT_ID is required. \
                Set it via: export POSTNL_CLIENT_ID=your_client_id"
            );
        }

        if let Some(ref token) = self.refresh_token
            && token.is_empty()
        {
            anyhow::bail!("POSTNL_REFRESH_TOKEN cannot be empty when set");
        }

        if let Some(ref interval) = self.update_interval {
            self.parse_update_interval(interval)?;
        }

        match self.token_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "POSTNL_TOKEN_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.token_store_type
            ),
        }

        if self.token_store_type == "file" {
            match self.token_store_path {
                Some(ref path) if path.is_empty() => anyhow::bail!(
                    "POSTNL_TOKEN_STORE_PATH cannot be empty when POSTNL_TOKEN_STORE_TYPE=file"
                ),
                Some(_) => {}
                None => anyhow::bail!(
                    "POSTNL_TOKEN_STORE_PATH is required when POSTNL_TOKEN_STORE_TYPE=file. \
                    Set it via: export POSTNL_TOKEN_STORE_PATH=/var/lib/postnl/entries.json"
                ),
            }
        }

        match self.output.as_str() {
            "log" | "json" => {}
            _ => anyhow::bail!(
                "POSTNL_OUTPUT '{}' is not supported. Supported outputs: log, json",
                self.output
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "POSTNL_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_postnl_config()?
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }

    /// Run the raw interval through the options flow
    fn parse_update_interval(&self, raw: &str) -> Result<u64> {
        let input = serde_json::json!({ "update_interval": raw });
        match OptionsFlow::default().step_init(Some(&input)) {
            Ok(FlowResult::CreateEntry { data, .. }) => Ok(data.update_interval),
            Ok(FlowResult::Form { .. }) => {
                anyhow::bail!("POSTNL_UPDATE_INTERVAL could not be applied")
            }
            Err(e) => anyhow::bail!("POSTNL_UPDATE_INTERVAL is invalid: {}", e),
        }
    }

    /// Assemble the core configuration
    fn to_postnl_config(&self) -> Result<PostnlConfig> {
        let mut config = PostnlConfig::new(&self.entry_id, &self.client_id);

        if let Some(ref token) = self.refresh_token {
            config.oauth = config.oauth.with_refresh_token(token);
        }

        if let Some(ref interval) = self.update_interval {
            config.options.update_interval = self.parse_update_interval(interval)?;
        }

        let defaults = EndpointConfig::default();
        config.endpoints = EndpointConfig {
            graphql_url: self.graphql_url.clone().unwrap_or(defaults.graphql_url),
            login_url: self.login_url.clone().unwrap_or(defaults.login_url),
            jouw_url: self.jouw_url.clone().unwrap_or(defaults.jouw_url),
        };

        config.token_store = match (self.token_store_type.as_str(), &self.token_store_path) {
            ("file", Some(path)) => TokenStoreConfig::File { path: path.clone() },
            _ => TokenStoreConfig::Memory,
        };

        Ok(config)
    }

    /// Copy of the configuration that is safe to log
    fn redacted(&self) -> Config {
        Config {
            client_id: self.client_id.clone(),
            refresh_token: self.refresh_token.as_ref().map(|_| "<REDACTED>".to_string()),
            entry_id: self.entry_id.clone(),
            update_interval: self.update_interval.clone(),
            token_store_type: self.token_store_type.clone(),
            token_store_path: self.token_store_path.clone(),
            output: self.output.clone(),
            log_level: self.log_level.clone(),
            graphql_url: self.graphql_url.clone(),
            login_url: self.login_url.clone(),
            jouw_url: self.jouw_url.clone(),
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PostnlExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PostnlExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // JSON output owns stdout; logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PostnlExitCode::ConfigError.into();
    }

    info!("Starting postnld daemon");
    debug!("Configuration: {:?}", config.redacted());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PostnlExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => PostnlExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                if is_startup_error(&e) {
                    PostnlExitCode::ConfigError
                } else {
                    PostnlExitCode::RuntimeError
                }
            }
        }
    });

    result.into()
}

/// Errors that mean the daemon could not start with this configuration
fn is_startup_error(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<Error>(),
        Some(Error::Config(_)) | Some(Error::ReauthRequired(_)) | Some(Error::TokenStore(_))
    )
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let postnl_config = config.to_postnl_config()?;
    let entry_id = postnl_config.entry_id.clone();

    info!("Token store type: {}", postnl_config.token_store.type_name());
    let store: Arc<dyn TokenStore> = Arc::from(create_token_store(&postnl_config.token_store).await?);

    let mut entry = ConfigEntry::load_or_bootstrap(&postnl_config, store.as_ref()).await?;
    if config.update_interval.is_some() && entry.options != postnl_config.options {
        info!(
            "Applying update interval {}s from environment",
            postnl_config.options.update_interval
        );
        entry
            .update_options(store.as_ref(), postnl_config.options)
            .await?;
    }

    let publisher: Arc<dyn StatePublisher> = match config.output.as_str() {
        "json" => Arc::new(JsonLinesPublisher::stdout()),
        _ => Arc::new(LogPublisher),
    };

    let services = PostnlClients::from_config(&postnl_config)?.into_services(store.clone(), publisher);
    let ctx = EntryContext::new();

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    // Setup is retried while the entry is not ready
    let mut events = loop {
        match setup_entry(&ctx, &entry, &postnl_config.engine, &services).await {
            Ok(events) => break events,
            Err(Error::NotReady(reason)) => {
                warn!(
                    "Entry {} not ready: {}. Retrying in {}s",
                    entry_id,
                    reason,
                    SETUP_RETRY_DELAY.as_secs()
                );
                tokio::select! {
                    _ = tokio::time::sleep(SETUP_RETRY_DELAY) => {}
                    signal = &mut shutdown => {
                        info!("Received shutdown signal during setup: {}", signal?);
                        store.flush().await?;
                        return Ok(());
                    }
                }
            }
            Err(e @ Error::ReauthRequired(_)) => {
                error!(
                    "PostNL rejected the stored credentials. \
                    Provide a new POSTNL_REFRESH_TOKEN and remove the stored entry."
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    };

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CoordinatorEvent::Started { poller, interval_secs } => {
                    info!("{} polling started ({}s)", poller, interval_secs)
                }
                CoordinatorEvent::UpdateSucceeded { poller } => debug!("{} updated", poller),
                CoordinatorEvent::UpdateFailed { poller, error } => {
                    warn!("{} update failed, keeping last data: {}", poller, error)
                }
                CoordinatorEvent::ReauthRequired { poller, error } => {
                    error!("{} needs re-authorization: {}", poller, error)
                }
                CoordinatorEvent::Stopped { reason } => info!("Polling stopped: {}", reason),
            }
        }
    });

    let coordinator = ctx
        .coordinator(&entry_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("Entry {} vanished after setup", entry_id))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let run = coordinator.run_with_shutdown(shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result?,
        signal = &mut shutdown => {
            info!("Received shutdown signal: {}", signal?);
            let _ = shutdown_tx.send(());
            run.await?;
        }
    }

    info!("Shutting down daemon");
    unload_entry(&ctx, &entry_id).await;
    store.flush().await?;
    event_logger.abort();

    Ok(())
}

async fn create_token_store(config: &TokenStoreConfig) -> Result<Box<dyn TokenStore>> {
    let store = match config {
        TokenStoreConfig::File { .. } => FileTokenStoreFactory.create(config).await?,
        TokenStoreConfig::Memory => MemoryTokenStoreFactory.create(config).await?,
    };
    Ok(store)
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            client_id: "client".to_string(),
            refresh_token: Some("refresh".to_string()),
            entry_id: "default".to_string(),
            update_interval: None,
            token_store_type: "memory".to_string(),
            token_store_path: None,
            output: "log".to_string(),
            log_level: "info".to_string(),
            graphql_url: None,
            login_url: None,
            jouw_url: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_update_interval_minimum() {
        let mut cfg = config();
        cfg.update_interval = Some("29".to_string());
        assert!(cfg.validate().is_err());

        cfg.update_interval = Some("30".to_string());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.to_postnl_config().unwrap().options.update_interval, 30);
    }

    #[test]
    fn test_file_store_requires_path() {
        let mut cfg = config();
        cfg.token_store_type = "file".to_string();
        assert!(cfg.validate().is_err());

        cfg.token_store_path = Some("/tmp/postnl/entries.json".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_output_and_endpoint_scheme() {
        let mut cfg = config();
        cfg.output = "mqtt".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.graphql_url = Some("ftp://graphql.example".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_redacted_hides_refresh_token() {
        let debug = format!("{:?}", config().redacted());
        assert!(!debug.contains("\"refresh\""));
        assert!(debug.contains("<REDACTED>"));
    }
}
