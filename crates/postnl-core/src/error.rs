//! Error types for PostNL tracking
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for PostNL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for PostNL tracking
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (token store, state files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote API answered with a non-success status
    #[error("API error ({api}): HTTP {status}: {message}")]
    Api {
        /// Which API answered
        api: String,
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The GraphQL endpoint answered 200 but reported query errors
    #[error("GraphQL query error: {0}")]
    GraphqlQuery(String),

    /// OAuth2 token acquisition or refresh failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Credentials were rejected; the entry needs to be re-authorized
    #[error("Re-authentication required: {0}")]
    ReauthRequired(String),

    /// Setup could not complete yet; the caller should retry later
    #[error("Entry not ready: {0}")]
    NotReady(String),

    /// A polling cycle failed as a whole
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// Token store errors
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// Invalid input (options flow, malformed payloads)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Entry or entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an API status error
    pub fn api(api: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            api: api.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a GraphQL query error
    pub fn graphql(msg: impl Into<String>) -> Self {
        Self::GraphqlQuery(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a re-authentication error
    pub fn reauth(msg: impl Into<String>) -> Self {
        Self::ReauthRequired(msg.into())
    }

    /// Create a "not ready" error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create an update failure
    pub fn update_failed(msg: impl Into<String>) -> Self {
        Self::UpdateFailed(msg.into())
    }

    /// Create a token store error
    pub fn token_store(msg: impl Into<String>) -> Self {
        Self::TokenStore(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error came from the transport or from an HTTP status.
    ///
    /// These are the failures that abort a polling cycle or make setup
    /// "not ready"; everything else is a local bug or bad input.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Api { .. } | Self::GraphqlQuery(_) | Self::Authentication(_)
        )
    }

    /// HTTP status carried by an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
