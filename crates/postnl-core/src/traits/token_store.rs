// # Token Store Trait
//
// Defines the interface for persisted config entry data.
//
// ## Purpose
//
// A config entry is one connected account. What must survive a restart is
// small: the OAuth token (so the session can refresh without a new
// authorization) and the entry options (update interval).
//
// ## Implementations
//
// - File-based: JSON file with atomic writes (`state::FileTokenStore`)
// - In-memory: tests and ephemeral deployments (`state::MemoryTokenStore`)
//
// ## Usage
//
// ```rust,ignore
// use postnl_core::traits::TokenStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* TokenStore implementation */;
//
//     if let Some(entry) = store.load("entry-1").await? {
//         println!("token expires at {}", entry.token.expires_at);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::auth::OAuthToken;
use crate::config::EntryOptions;

/// Persisted data for one config entry
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredEntry {
    /// The current OAuth token
    pub token: OAuthToken,
    /// User-editable options
    #[serde(default)]
    pub options: EntryOptions,
    /// Timestamp of the last write
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl StoredEntry {
    pub fn new(token: OAuthToken, options: EntryOptions) -> Self {
        Self {
            token,
            options,
            last_updated: chrono::Utc::now(),
        }
    }
}

/// Trait for token store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: the store never decides when to refresh
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted data for an entry
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StoredEntry))`: the entry's data
    /// - `Ok(None)`: nothing stored for this entry
    /// - `Err(Error)`: storage error
    async fn load(&self, entry_id: &str) -> Result<Option<StoredEntry>, crate::Error>;

    /// Create or replace the persisted data for an entry
    async fn save(&self, entry_id: &str, entry: &StoredEntry) -> Result<(), crate::Error>;

    /// Replace only the token, keeping the options
    async fn save_token(&self, entry_id: &str, token: &OAuthToken) -> Result<(), crate::Error> {
        let options = self
            .load(entry_id)
            .await?
            .map(|entry| entry.options)
            .unwrap_or_default();
        self.save(entry_id, &StoredEntry::new(token.clone(), options))
            .await
    }

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing token stores from configuration
#[async_trait]
pub trait TokenStoreFactory: Send + Sync {
    /// Create a TokenStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::TokenStoreConfig,
    ) -> Result<Box<dyn TokenStore>, crate::Error>;
}
