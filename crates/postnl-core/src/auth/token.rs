//! OAuth2 token record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Seconds before expiry at which a token is already treated as expired
pub const CLOCK_OUT_OF_SYNC_MAX_SECS: f64 = 20.0;

/// An OAuth2 token as returned by the token endpoint, plus `expires_at`
///
/// # Security
///
/// The Debug implementation does NOT expose the access or refresh token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Expiry as unix seconds; 0 means "unknown, treat as expired"
    #[serde(default)]
    pub expires_at: f64,

    /// Any other fields returned by the token endpoint
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"<REDACTED>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl OAuthToken {
    /// Create a token that only carries a refresh token.
    ///
    /// It is expired from the start, so the first `ensure_token_valid`
    /// performs a refresh grant.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            token_type: default_token_type(),
            expires_in: None,
            expires_at: 0.0,
            extra: Map::new(),
        }
    }

    /// Whether the token is still valid for at least the clock skew margin
    pub fn is_valid_at(&self, now: f64) -> bool {
        !self.access_token.is_empty() && self.expires_at >= now + CLOCK_OUT_OF_SYNC_MAX_SECS
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(unix_now())
    }

    /// Stamp `expires_at` from `expires_in` relative to `now`
    pub fn stamp_expiry(&mut self, now: f64) {
        self.expires_at = now + self.expires_in.unwrap_or(0) as f64;
    }
}

/// Current time as fractional unix seconds
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Shorten a secret for log output
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{}…", prefix)
}
