//! Device and entity registries
//!
//! Devices group the entities of one account. Entities are keyed by their
//! unique id, which must stay stable across restarts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use postnl_core::registry::{DeviceRegistry, EntityRegistry};
//!
//! let devices = DeviceRegistry::new();
//! let entities = EntityRegistry::new();
//!
//! let device_id = devices.get_or_create("entry-1", &device_info);
//! entities.register("entry-1", &device_id, "acc-1_delivery", "PostNL_delivery");
//!
//! // Rewrite unique ids created by older versions
//! let migrated = migrate_unique_ids(&devices, &entities, "entry-1", "acc-1");
//! ```
//!
//! ## Thread Safety
//!
//! Both registries use interior mutability with RwLock, allowing
//! concurrent reads and exclusive writes. A poisoned lock is recovered
//! rather than propagated: the maps hold plain data.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sensor::{DeviceInfo, account_identifiers};

/// A registered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: String,
    pub config_entry_id: String,
    pub info: DeviceInfo,
}

/// A registered entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityEntry {
    pub entity_id: String,
    pub unique_id: String,
    pub config_entry_id: String,
    pub device_id: String,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceEntry>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the device with these identifiers, creating it if missing
    ///
    /// Existing devices get their name and manufacturer refreshed.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> String {
        let mut devices = write(&self.devices);

        if let Some(device) = devices
            .values_mut()
            .find(|d| d.config_entry_id == config_entry_id && d.info.identifiers == info.identifiers)
        {
            device.info = info.clone();
            return device.id.clone();
        }

        let id = format!("device-{}", devices.len() + 1);
        debug!("Registering device {} for entry {}", id, config_entry_id);
        devices.insert(
            id.clone(),
            DeviceEntry {
                id: id.clone(),
                config_entry_id: config_entry_id.to_string(),
                info: info.clone(),
            },
        );
        id
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceEntry> {
        read(&self.devices).get(device_id).cloned()
    }

    /// Devices belonging to a config entry
    pub fn for_config_entry(&self, config_entry_id: &str) -> Vec<DeviceEntry> {
        read(&self.devices)
            .values()
            .filter(|d| d.config_entry_id == config_entry_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// entity_id -> entry
    entities: RwLock<HashMap<String, EntityEntry>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, or return the existing one with this unique id
    pub fn register(
        &self,
        config_entry_id: &str,
        device_id: &str,
        unique_id: &str,
        name: &str,
    ) -> EntityEntry {
        let mut entities = write(&self.entities);

        if let Some(existing) = entities.values().find(|e| e.unique_id == unique_id) {
            return existing.clone();
        }

        // Same sensor names across accounts get a numeric suffix
        let base = format!("sensor.{}", name.to_lowercase());
        let mut entity_id = base.clone();
        let mut suffix = 2;
        while entities.contains_key(&entity_id) {
            entity_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        let entry = EntityEntry {
            entity_id: entity_id.clone(),
            unique_id: unique_id.to_string(),
            config_entry_id: config_entry_id.to_string(),
            device_id: device_id.to_string(),
        };
        debug!("Registering entity {} ({})", entity_id, unique_id);
        entities.insert(entity_id, entry.clone());
        entry
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityEntry> {
        read(&self.entities).get(entity_id).cloned()
    }

    pub fn for_device(&self, device_id: &str) -> Vec<EntityEntry> {
        let mut entries: Vec<_> = read(&self.entities)
            .values()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entries
    }

    /// Change the unique id of an entity
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: no entity with this id
    /// - `Error::InvalidInput`: another entity already uses `new_unique_id`
    pub fn update_unique_id(&self, entity_id: &str, new_unique_id: &str) -> Result<()> {
        let mut entities = write(&self.entities);

        if entities
            .values()
            .any(|e| e.unique_id == new_unique_id && e.entity_id != entity_id)
        {
            return Err(Error::invalid_input(format!(
                "Unique id {} is already in use",
                new_unique_id
            )));
        }

        let entity = entities
            .get_mut(entity_id)
            .ok_or_else(|| Error::not_found(format!("Entity not registered: {}", entity_id)))?;
        entity.unique_id = new_unique_id.to_string();
        Ok(())
    }

    pub fn len(&self) -> usize {
        read(&self.entities).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unique id an older version's entity should get
///
/// Returns `None` when the id is already account-scoped.
pub fn migrated_unique_id(unique_id: &str, account_id: &str) -> Option<String> {
    if unique_id.starts_with(account_id) {
        return None;
    }

    let mut parts = unique_id.split('_');
    let first = parts.next().unwrap_or_default();
    let part = parts.next().unwrap_or(first);

    Some(format!("{}_{}", account_id, part))
}

/// Rewrite legacy unique ids of the account device's entities
///
/// Returns the number of entities migrated.
pub fn migrate_unique_ids(
    devices: &DeviceRegistry,
    entities: &EntityRegistry,
    config_entry_id: &str,
    account_id: &str,
) -> Result<usize> {
    let identifiers: BTreeSet<(String, String)> = account_identifiers(account_id);
    let mut migrated = 0;

    for device in devices
        .for_config_entry(config_entry_id)
        .into_iter()
        .filter(|d| d.info.identifiers == identifiers)
    {
        for entity in entities.for_device(&device.id) {
            let Some(new_unique_id) = migrated_unique_id(&entity.unique_id, account_id) else {
                continue;
            };

            info!(
                "Migrating unique id of {} from {} to {}",
                entity.entity_id, entity.unique_id, new_unique_id
            );
            entities.update_unique_id(&entity.entity_id, &new_unique_id)?;
            migrated += 1;
        }
    }

    Ok(migrated)
}
