//! OAuth2 session and config entry authentication
//!
//! - [`OAuth2Session`] keeps the entry's token fresh through an
//!   [`OAuth2Implementation`] and tries to persist every refreshed token.
//! - [`ConfigEntryAuth`] layers the token-validity probe on top: it runs
//!   before setup and before every polling cycle.
//!
//! ## Validation flow
//!
//! ```text
//! ensure_token_valid ──► profile probe ──► Ok(access_token)
//!        │                    │
//!        │                    ├─ GraphQL query error ─► force expire ─► ensure_token_valid
//!        │                    │
//!        └────────────────────┴─ HTTP 400/401 ─► request re-auth ─► Err(ReauthRequired)
//! ```

pub mod token;

pub use token::{OAuthToken, redact, unix_now};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::traits::{OAuth2Implementation, ShipmentsApi, TokenStore};

/// Seconds subtracted from "now" when forcing a token to look expired
const FORCE_EXPIRE_OFFSET_SECS: f64 = 600.0;

/// OAuth2 session bound to one config entry
pub struct OAuth2Session {
    entry_id: String,
    token: RwLock<OAuthToken>,
    implementation: Arc<dyn OAuth2Implementation>,
    store: Arc<dyn TokenStore>,
    /// Serializes refresh grants so concurrent callers refresh once
    refresh_lock: Mutex<()>,
}

impl OAuth2Session {
    pub fn new(
        entry_id: impl Into<String>,
        token: OAuthToken,
        implementation: Arc<dyn OAuth2Implementation>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            token: RwLock::new(token),
            implementation,
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Current access token (may be expired)
    pub async fn access_token(&self) -> String {
        self.token.read().await.access_token.clone()
    }

    /// Snapshot of the full token
    pub async fn token(&self) -> OAuthToken {
        self.token.read().await.clone()
    }

    /// Refresh the token if it expires within the clock skew margin
    ///
    /// The refreshed token is swapped in first, then persisted. A failed
    /// write is logged and does not fail the check.
    pub async fn ensure_token_valid(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.token.read().await.clone();
        if current.is_valid() {
            return Ok(());
        }

        if current.refresh_token.is_none() {
            return Err(Error::auth("Token expired and no refresh token is available"));
        }

        debug!(
            "Refreshing OAuth token for entry {} via {}",
            self.entry_id,
            self.implementation.name()
        );

        let mut refreshed = self.implementation.refresh_token(&current).await?;
        refreshed.stamp_expiry(unix_now());
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = current.refresh_token.clone();
        }

        info!(
            "OAuth token refreshed for entry {}, expires in {}s",
            self.entry_id,
            refreshed.expires_in.unwrap_or(0)
        );
        *self.token.write().await = refreshed.clone();

        // The old refresh token may already be revoked: a failed write must
        // not leave the session on it
        if let Err(e) = self.store.save_token(&self.entry_id, &refreshed).await {
            error!(
                "Failed to persist refreshed token for entry {}: {}",
                self.entry_id, e
            );
        }

        Ok(())
    }

    /// Make the current token look expired so the next check refreshes it
    pub async fn force_expire(&self) {
        debug!("Forcing token refresh due to expiration");
        self.token.write().await.expires_at = unix_now() - FORCE_EXPIRE_OFFSET_SECS;
    }
}

/// PostNL authentication tied to an OAuth2-based config entry
pub struct ConfigEntryAuth {
    session: Arc<OAuth2Session>,
    graphql: Arc<dyn ShipmentsApi>,
    reauth_requested: AtomicBool,
}

impl ConfigEntryAuth {
    pub fn new(session: Arc<OAuth2Session>, graphql: Arc<dyn ShipmentsApi>) -> Self {
        Self {
            session,
            graphql,
            reauth_requested: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<OAuth2Session> {
        &self.session
    }

    /// Current access token
    pub async fn access_token(&self) -> String {
        self.session.access_token().await
    }

    /// Whether a re-authentication flow was requested for this entry
    pub fn reauth_requested(&self) -> bool {
        self.reauth_requested.load(Ordering::SeqCst)
    }

    /// Clear the re-auth request after the user re-authorized
    pub fn clear_reauth(&self) {
        self.reauth_requested.store(false, Ordering::SeqCst);
    }

    /// Ensure the token is valid and accepted by the API
    ///
    /// # Returns
    ///
    /// - `Ok(access_token)`: a token that passed the profile probe (or was
    ///   refreshed after a GraphQL query error)
    /// - `Err(Error::ReauthRequired)`: the API rejected the credentials
    ///   with 400/401; a re-auth request is recorded
    /// - `Err(Error)`: any other transport or token endpoint failure
    pub async fn check_and_refresh_token(&self) -> Result<String> {
        let entry_id = self.session.entry_id();
        debug!("Ensuring token validity for entry {}", entry_id);

        if let Err(e) = self.session.ensure_token_valid().await {
            return Err(self.classify(e));
        }

        let access_token = self.session.access_token().await;
        debug!(
            "Fetching user profile to validate token {}",
            redact(&access_token)
        );

        match self.graphql.profile(&access_token).await {
            Ok(_) => {}
            Err(Error::GraphqlQuery(message)) => {
                warn!(
                    "GraphQL error occurred: {}. Refreshing token and retrying.",
                    message
                );
                self.session.force_expire().await;
                if let Err(e) = self.session.ensure_token_valid().await {
                    return Err(self.classify(e));
                }
            }
            Err(e) => return Err(self.classify(e)),
        }

        Ok(self.session.access_token().await)
    }

    /// Turn credential rejections into a re-auth request
    fn classify(&self, e: Error) -> Error {
        error!("API error occurred during token validation: {}", e);
        match e.status() {
            Some(400) | Some(401) => {
                warn!(
                    "Credentials rejected for entry {}. Initiating reauth flow.",
                    self.session.entry_id()
                );
                self.reauth_requested.store(true, Ordering::SeqCst);
                Error::reauth(e.to_string())
            }
            _ => e,
        }
    }
}
