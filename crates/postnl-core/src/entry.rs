// # Config Entry Lifecycle
//
// Setup and unload of one PostNL account ("config entry").
//
// ## Setup
//
// 1. Validate the OAuth token (profile probe)
// 2. Fetch the account's userinfo
// 3. Migrate entity unique ids written by older versions
// 4. Build the update coordinator and run the first refresh
// 5. Register the device and both sensors, publish their initial state
// 6. Spawn a listener that republishes sensor state on every new snapshot
//
// Every failure before step 5 that may resolve on its own is reported as
// `Error::NotReady`; rejected credentials are reported as
// `Error::ReauthRequired`.
//
// ## Context
//
// [`EntryContext`] holds everything that is shared between entries: the
// loaded entry runtimes (keyed by entry id) and the device/entity
// registries. It is passed explicitly to setup and unload.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::{ConfigEntryAuth, OAuth2Session, OAuthToken};
use crate::config::{EngineConfig, EntryOptions, PostnlConfig};
use crate::coordinator::PostnlCoordinator;
use crate::engine::{CoordinatorEvent, UpdateCoordinator};
use crate::error::{Error, Result};
use crate::model::{CoordinatorData, UserInfo};
use crate::registry::{DeviceRegistry, EntityRegistry, migrate_unique_ids};
use crate::sensor::{DeliverySensor, DeviceInfo, SensorState};
use crate::traits::{
    LoginApi, OAuth2Implementation, ShipmentsApi, StatePublisher, StoredEntry, TokenStore,
    TrackAndTraceApi,
};

/// The update coordinator of a PostNL entry
pub type PostnlUpdateCoordinator = UpdateCoordinator<PostnlCoordinator>;

/// A persisted configuration instance for one account
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    pub token: OAuthToken,
    pub options: EntryOptions,
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>, token: OAuthToken, options: EntryOptions) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: "PostNL".to_string(),
            token,
            options,
        }
    }

    /// Load the entry from the store, or create it from the bootstrap token
    ///
    /// # Errors
    ///
    /// `Error::Config` if nothing is stored and no refresh token is
    /// configured.
    pub async fn load_or_bootstrap(config: &PostnlConfig, store: &dyn TokenStore) -> Result<Self> {
        if let Some(stored) = store.load(&config.entry_id).await? {
            debug!("Loaded stored entry {}", config.entry_id);
            return Ok(Self::new(&config.entry_id, stored.token, stored.options));
        }

        let refresh_token = config.oauth.initial_refresh_token.as_deref().ok_or_else(|| {
            Error::config(format!(
                "No stored token for entry {} and no refresh token configured",
                config.entry_id
            ))
        })?;

        info!("Bootstrapping entry {} from refresh token", config.entry_id);
        let entry = Self::new(
            &config.entry_id,
            OAuthToken::from_refresh_token(refresh_token),
            config.options,
        );
        store
            .save(&entry.entry_id, &StoredEntry::new(entry.token.clone(), entry.options))
            .await?;

        Ok(entry)
    }

    /// Persist new options; they take effect on the next setup
    pub async fn update_options(&mut self, store: &dyn TokenStore, options: EntryOptions) -> Result<()> {
        options.validate()?;

        let stored = match store.load(&self.entry_id).await? {
            Some(mut stored) => {
                stored.options = options;
                stored.last_updated = chrono::Utc::now();
                stored
            }
            None => StoredEntry::new(self.token.clone(), options),
        };
        store.save(&self.entry_id, &stored).await?;

        self.options = options;
        Ok(())
    }
}

/// Collaborators an entry needs
#[derive(Clone)]
pub struct EntryServices {
    pub oauth: Arc<dyn OAuth2Implementation>,
    pub graphql: Arc<dyn ShipmentsApi>,
    pub jouw: Arc<dyn TrackAndTraceApi>,
    pub login: Arc<dyn LoginApi>,
    pub store: Arc<dyn TokenStore>,
    pub publisher: Arc<dyn StatePublisher>,
}

/// The sensors of one entry and where their state goes
pub struct SensorPlatform {
    sensors: Mutex<Vec<DeliverySensor>>,
    publisher: Arc<dyn StatePublisher>,
}

impl SensorPlatform {
    pub fn new(sensors: Vec<DeliverySensor>, publisher: Arc<dyn StatePublisher>) -> Self {
        Self {
            sensors: Mutex::new(sensors),
            publisher,
        }
    }

    /// Current snapshots of all sensors
    pub async fn states(&self) -> Vec<SensorState> {
        self.sensors.lock().await.iter().map(|s| s.snapshot()).collect()
    }

    /// Publish the current state of every sensor
    pub async fn publish_all(&self) {
        for state in self.states().await {
            self.publish(&state).await;
        }
    }

    /// Recompute every sensor from new data and publish
    pub async fn handle_update(&self, data: &CoordinatorData) {
        let states: Vec<SensorState> = self
            .sensors
            .lock()
            .await
            .iter_mut()
            .map(|s| s.handle_coordinator_update(data))
            .collect();

        for state in &states {
            self.publish(state).await;
        }
    }

    /// Republish whenever the coordinator produces a new snapshot
    pub fn follow(self: Arc<Self>, mut updates: watch::Receiver<Option<CoordinatorData>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let data = updates.borrow_and_update().clone();
                if let Some(data) = data {
                    self.handle_update(&data).await;
                }
            }
            debug!("Coordinator closed, sensor listener stopped");
        })
    }

    async fn publish(&self, state: &SensorState) {
        if let Err(e) = self.publisher.publish(state).await {
            warn!("Failed to publish state of {}: {}", state.unique_id, e);
        }
    }
}

/// Everything that exists while an entry is loaded
pub struct EntryRuntime {
    pub auth: Arc<ConfigEntryAuth>,
    pub userinfo: UserInfo,
    pub coordinator: Arc<PostnlUpdateCoordinator>,
    pub platform: Arc<SensorPlatform>,
    listener: JoinHandle<()>,
}

/// Shared state for all config entries
#[derive(Default)]
pub struct EntryContext {
    entries: RwLock<HashMap<String, EntryRuntime>>,
    devices: DeviceRegistry,
    entities: EntityRegistry,
}

impl EntryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub async fn is_loaded(&self, entry_id: &str) -> bool {
        self.entries.read().await.contains_key(entry_id)
    }

    pub async fn coordinator(&self, entry_id: &str) -> Option<Arc<PostnlUpdateCoordinator>> {
        self.entries
            .read()
            .await
            .get(entry_id)
            .map(|r| r.coordinator.clone())
    }

    pub async fn auth(&self, entry_id: &str) -> Option<Arc<ConfigEntryAuth>> {
        self.entries.read().await.get(entry_id).map(|r| r.auth.clone())
    }

    pub async fn userinfo(&self, entry_id: &str) -> Option<UserInfo> {
        self.entries
            .read()
            .await
            .get(entry_id)
            .map(|r| r.userinfo.clone())
    }

    pub async fn platform(&self, entry_id: &str) -> Option<Arc<SensorPlatform>> {
        self.entries
            .read()
            .await
            .get(entry_id)
            .map(|r| r.platform.clone())
    }
}

/// Set up a config entry
///
/// # Returns
///
/// The coordinator's event receiver. Run the coordinator (see
/// [`EntryContext::coordinator`]) to start periodic polling.
///
/// # Errors
///
/// - `Error::ReauthRequired`: the API rejected the credentials
/// - `Error::NotReady`: validation, userinfo or first refresh failed
/// - `Error::Config`: the entry is already loaded, or invalid options
pub async fn setup_entry(
    ctx: &EntryContext,
    entry: &ConfigEntry,
    engine: &EngineConfig,
    services: &EntryServices,
) -> Result<mpsc::Receiver<CoordinatorEvent>> {
    let entry_id = entry.entry_id.as_str();
    if ctx.is_loaded(entry_id).await {
        return Err(Error::config(format!("Entry {} is already loaded", entry_id)));
    }

    debug!("Setting up PostNL entry {}", entry_id);

    let session = Arc::new(OAuth2Session::new(
        entry_id,
        entry.token.clone(),
        services.oauth.clone(),
        services.store.clone(),
    ));
    let auth = Arc::new(ConfigEntryAuth::new(session, services.graphql.clone()));

    let access_token = match auth.check_and_refresh_token().await {
        Ok(token) => token,
        Err(e @ Error::ReauthRequired(_)) => return Err(e),
        Err(e) => {
            error!("Failed to validate token for entry {}: {}", entry_id, e);
            return Err(Error::not_ready(format!("Token validation failed: {}", e)));
        }
    };

    let userinfo = services
        .login
        .userinfo(&access_token)
        .await
        .map_err(|e| Error::not_ready(format!("Failed to fetch user info: {}", e)))?;
    debug!("Userinfo for entry {}: {:?}", entry_id, userinfo);

    if let Some(err) = &userinfo.error {
        return Err(Error::not_ready(format!("User info reported an error: {}", err)));
    }
    if userinfo.account_id.is_empty() {
        return Err(Error::not_ready("User info contains no account id"));
    }

    let migrated = migrate_unique_ids(&ctx.devices, &ctx.entities, entry_id, &userinfo.account_id)?;
    if migrated > 0 {
        info!("Migrated {} entity unique ids for entry {}", migrated, entry_id);
    }

    let poller = Arc::new(PostnlCoordinator::new(
        auth.clone(),
        services.graphql.clone(),
        services.jouw.clone(),
    ));
    let (coordinator, events) =
        UpdateCoordinator::new(poller, entry.options.update_interval(), engine)?;
    let data = coordinator.first_refresh().await?;
    let coordinator = Arc::new(coordinator);

    let sensors = vec![
        DeliverySensor::receiver(&userinfo, &data),
        DeliverySensor::sender(&userinfo, &data),
    ];

    let device_id = ctx
        .devices
        .get_or_create(entry_id, &DeviceInfo::for_account(&userinfo));
    for sensor in &sensors {
        ctx.entities
            .register(entry_id, &device_id, sensor.unique_id(), sensor.name());
    }

    let platform = Arc::new(SensorPlatform::new(sensors, services.publisher.clone()));
    platform.publish_all().await;
    let listener = platform.clone().follow(coordinator.subscribe());

    info!(
        "PostNL entry {} set up for account {} ({} packages)",
        entry_id,
        userinfo.account_id,
        data.total()
    );

    ctx.entries.write().await.insert(
        entry_id.to_string(),
        EntryRuntime {
            auth,
            userinfo,
            coordinator,
            platform,
            listener,
        },
    );

    Ok(events)
}

/// Unload a config entry
///
/// Returns `false` if the entry was not loaded.
pub async fn unload_entry(ctx: &EntryContext, entry_id: &str) -> bool {
    match ctx.entries.write().await.remove(entry_id) {
        Some(runtime) => {
            runtime.listener.abort();
            info!("Unloaded PostNL entry {}", entry_id);
            true
        }
        None => {
            warn!("Entry {} not found in context during unload", entry_id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryTokenStore;

    #[tokio::test]
    async fn test_bootstrap_requires_refresh_token() {
        let store = MemoryTokenStore::new();
        let config = PostnlConfig::new("entry-1", "client");

        assert!(matches!(
            ConfigEntry::load_or_bootstrap(&config, &store).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_then_load() {
        let store = MemoryTokenStore::new();
        let mut config = PostnlConfig::new("entry-1", "client");
        config.oauth = config.oauth.with_refresh_token("r1");
        config.options = EntryOptions::new(60);

        let entry = ConfigEntry::load_or_bootstrap(&config, &store).await.unwrap();
        assert_eq!(entry.token.refresh_token.as_deref(), Some("r1"));

        // Stored data wins over configuration
        config.oauth.initial_refresh_token = Some("r2".to_string());
        config.options = EntryOptions::new(90);
        let entry = ConfigEntry::load_or_bootstrap(&config, &store).await.unwrap();
        assert_eq!(entry.token.refresh_token.as_deref(), Some("r1"));
        assert_eq!(entry.options.update_interval, 60);
    }

    #[tokio::test]
    async fn test_update_options_rejects_short_interval() {
        let store = MemoryTokenStore::new();
        let mut entry = ConfigEntry::new(
            "entry-1",
            OAuthToken::from_refresh_token("r1"),
            EntryOptions::default(),
        );

        assert!(entry.update_options(&store, EntryOptions::new(10)).await.is_err());

        entry.update_options(&store, EntryOptions::new(45)).await.unwrap();
        let stored = store.load("entry-1").await.unwrap().unwrap();
        assert_eq!(stored.options.update_interval, 45);
    }

    #[tokio::test]
    async fn test_unload_unknown_entry() {
        let ctx = EntryContext::new();
        assert!(!unload_entry(&ctx, "missing").await);
    }
}
