// # Memory Token Store
//
// In-memory implementation of TokenStore.
//
// ## Crash Behavior
//
// - All tokens are lost on restart
// - The next start bootstraps again from the configured refresh token
//
// ## When to Use
//
// - Testing environments
// - Deployments that always inject a fresh refresh token at start

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::config::TokenStoreConfig;
use crate::traits::token_store::{StoredEntry, TokenStore, TokenStoreFactory};
use crate::Error;

/// In-memory token store implementation
///
/// # Example
///
/// ```rust,no_run
/// use postnl_core::auth::OAuthToken;
/// use postnl_core::config::EntryOptions;
/// use postnl_core::state::MemoryTokenStore;
/// use postnl_core::traits::{StoredEntry, TokenStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTokenStore::new();
///
///     let entry = StoredEntry::new(OAuthToken::from_refresh_token("r"), EntryOptions::default());
///     store.save("entry-1", &entry).await?;
///
///     assert!(store.load("entry-1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, entry_id: &str) -> Result<Option<StoredEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(entry_id).cloned())
    }

    async fn save(&self, entry_id: &str, entry: &StoredEntry) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(entry_id.to_string(), entry.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for memory token stores
pub struct MemoryTokenStoreFactory;

#[async_trait]
impl TokenStoreFactory for MemoryTokenStoreFactory {
    async fn create(&self, config: &TokenStoreConfig) -> Result<Box<dyn TokenStore>, Error> {
        match config {
            TokenStoreConfig::Memory => Ok(Box::new(MemoryTokenStore::new())),
            _ => Err(Error::config("Invalid config for memory token store")),
        }
    }
}
