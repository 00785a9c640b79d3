//! Configuration types for PostNL tracking
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default polling interval (in seconds)
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 90;

/// Minimum polling interval accepted by the options flow (in seconds)
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 30;

/// Default GraphQL endpoint
pub const DEFAULT_GRAPHQL_URL: &str = "https://graphql.postnl.nl/";

/// Default login service base (token and userinfo endpoints live below it)
pub const DEFAULT_LOGIN_URL: &str =
    "https://login.postnl.nl/101112a0-4a0f-4bbb-8176-2f1b2d370d7c/login";

/// Default track-and-trace host
pub const DEFAULT_JOUW_URL: &str = "https://jouw.postnl.nl";

/// Main configuration for one config entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostnlConfig {
    /// Config entry identifier
    pub entry_id: String,

    /// OAuth2 client configuration
    pub oauth: OAuthConfig,

    /// Remote API endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Token store configuration
    #[serde(default)]
    pub token_store: TokenStoreConfig,

    /// Entry options (user-editable)
    #[serde(default)]
    pub options: EntryOptions,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PostnlConfig {
    /// Create a configuration with defaults for everything but the identity
    pub fn new(entry_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            oauth: OAuthConfig::new(client_id),
            endpoints: EndpointConfig::default(),
            token_store: TokenStoreConfig::default(),
            options: EntryOptions::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.entry_id.is_empty() {
            return Err(crate::Error::config("Entry id cannot be empty"));
        }

        self.oauth.validate()?;
        self.endpoints.validate()?;
        self.token_store.validate()?;
        self.options.validate()?;

        Ok(())
    }
}

/// OAuth2 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Public OAuth2 client id
    pub client_id: String,

    /// Refresh token used to bootstrap an entry that has no stored token yet
    #[serde(default, skip_serializing)]
    pub initial_refresh_token: Option<String>,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            initial_refresh_token: None,
        }
    }

    /// Set the bootstrap refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.initial_refresh_token = Some(refresh_token.into());
        self
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.client_id.is_empty() {
            return Err(crate::Error::config("OAuth client id cannot be empty"));
        }
        if self
            .initial_refresh_token
            .as_ref()
            .is_some_and(|token| token.is_empty())
        {
            return Err(crate::Error::config("Initial refresh token cannot be empty"));
        }
        Ok(())
    }
}

/// Remote API endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// GraphQL endpoint URL
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Login service base URL
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Track-and-trace host URL
    #[serde(default = "default_jouw_url")]
    pub jouw_url: String,
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, url) in [
            ("GraphQL", &self.graphql_url),
            ("login", &self.login_url),
            ("track-and-trace", &self.jouw_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "{} URL must use HTTP or HTTPS scheme. Got: {}",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            graphql_url: default_graphql_url(),
            login_url: default_login_url(),
            jouw_url: default_jouw_url(),
        }
    }
}

fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_jouw_url() -> String {
    DEFAULT_JOUW_URL.to_string()
}

/// Token store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenStoreConfig {
    /// File-based token store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory token store (not persistent)
    #[default]
    Memory,
}

impl TokenStoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TokenStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Token store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            TokenStoreConfig::File { .. } => "file",
            TokenStoreConfig::Memory => "memory",
        }
    }
}

/// User-editable entry options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Polling interval in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

impl EntryOptions {
    pub fn new(update_interval: u64) -> Self {
        Self { update_interval }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.update_interval < MIN_UPDATE_INTERVAL_SECS {
            return Err(crate::Error::invalid_input(format!(
                "update_interval must be at least {} seconds. Got: {}",
                MIN_UPDATE_INTERVAL_SECS, self.update_interval
            )));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
        }
    }
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Initial delay before the first scheduled refresh (in seconds)
    ///
    /// The first refresh during setup is not affected.
    #[serde(default)]
    pub startup_delay_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            startup_delay_secs: 0,
        }
    }
}

fn default_event_channel_capacity() -> usize {
    100
}
