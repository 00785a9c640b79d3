// # File Token Store
//
// File-based implementation of TokenStore with crash recovery.
//
// ## Purpose
//
// Keeps each config entry's OAuth token and options across daemon
// restarts. Losing the refresh token means the account has to be
// re-authorized by hand, so writes are atomic and a backup is kept.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validated on load
// - Automatic backup: `.backup` holds the last known good state
// - Recovery: falls back to the backup if the main file is corrupted
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "entry-1": {
//       "token": { "access_token": "...", "refresh_token": "...", "expires_at": 1714560000.0 },
//       "options": { "update_interval": 90 },
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::TokenStoreConfig;
use crate::traits::token_store::{StoredEntry, TokenStore, TokenStoreFactory};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based token store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use postnl_core::state::FileTokenStore;
/// use postnl_core::traits::TokenStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTokenStore::new("/var/lib/postnl/entries.json").await?;
///
///     if let Some(entry) = store.load("entry-1").await? {
///         println!("interval: {}s", entry.options.update_interval);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    entries: HashMap<String, StoredEntry>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    entries: HashMap<String, StoredEntry>,
}

/// Why a load failed
enum LoadError {
    /// The file exists but is not a valid store file
    Corrupt(Error),
    /// The file could not be read at all
    Io(Error),
}

impl FileTokenStore {
    /// Create or load a file token store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing store file
    /// 3. On corruption, load the backup instead
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create token store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                entries,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, StoredEntry>, Error> {
        match Self::load_file(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded token store: {} entries", entries.len());
                Ok(entries)
            }
            Err(LoadError::Io(e)) => Err(e),
            Err(LoadError::Corrupt(e)) => {
                tracing::warn!(
                    "Token store appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty token store.");
                    return Ok(HashMap::new());
                }

                match Self::load_file(&backup_path).await {
                    Ok(entries) => {
                        tracing::info!("Recovered token store from backup: {} entries", entries.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore token store from backup: {}",
                                restore_err
                            );
                        }
                        Ok(entries)
                    }
                    Err(LoadError::Corrupt(backup_err)) | Err(LoadError::Io(backup_err)) => {
                        tracing::error!(
                            "Backup also unusable: {}. Starting with empty token store.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
        }
    }

    async fn load_file(path: &Path) -> Result<HashMap<String, StoredEntry>, LoadError> {
        if !path.exists() {
            tracing::debug!("Token store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::token_store(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        })?;

        let store_file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::token_store(format!(
                "Failed to parse {}: {}",
                path.display(),
                e
            )))
        })?;

        if store_file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Token store version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                store_file.version
            );
        }

        Ok(store_file.entries)
    }

    /// Write the store atomically (temp file, backup, rename)
    async fn write_file(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let store_file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            entries: state_guard.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&store_file)?;

        let temp_path = self.temp_path();
        {
            // Refresh tokens are credentials: owner-only from creation on.
            // A stale temp file would keep its old mode.
            let _ = fs::remove_file(&temp_path).await;
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            options.mode(0o600);

            let mut file = options.open(&temp_path).await.map_err(|e| {
                Error::token_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create token store backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::token_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state_guard.dirty = false;
        tracing::trace!("Token store written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, entry_id: &str) -> Result<Option<StoredEntry>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.entries.get(entry_id).cloned())
    }

    async fn save(&self, entry_id: &str, entry: &StoredEntry) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .entries
                .insert(entry_id.to_string(), entry.clone());
            state_guard.dirty = true;
        }

        // Immediate write: a lost refresh token cannot be recovered
        self.write_file().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_file().await } else { Ok(()) }
    }
}

/// Factory for file token stores
pub struct FileTokenStoreFactory;

#[async_trait]
impl TokenStoreFactory for FileTokenStoreFactory {
    async fn create(&self, config: &TokenStoreConfig) -> Result<Box<dyn TokenStore>, Error> {
        match config {
            TokenStoreConfig::File { path } => Ok(Box::new(FileTokenStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file token store")),
        }
    }
}
