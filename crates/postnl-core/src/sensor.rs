//! Delivery sensors
//!
//! Each config entry exposes two sensors, one per shipment list:
//!
//! | sensor                | list     |
//! |-----------------------|----------|
//! | `PostNL_delivery`     | receiver |
//! | `PostNL_distribution` | sender   |
//!
//! The state is the number of packages still en route. Attributes carry
//! the full package records split into `enroute` and `delivered`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CoordinatorData, Package, ShipmentRole, UserInfo};

/// Integration domain, used in device identifiers
pub const DOMAIN: &str = "postnl";

pub const MANUFACTURER: &str = "PostNL";
pub const UNIT_OF_MEASUREMENT: &str = "packages";
pub const ICON: &str = "mdi:package-variant-closed";

/// Device the sensors of one account belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: BTreeSet<(String, String)>,
    pub name: Option<String>,
    pub manufacturer: String,
}

impl DeviceInfo {
    /// Device for a PostNL account
    pub fn for_account(user: &UserInfo) -> Self {
        Self {
            identifiers: account_identifiers(&user.account_id),
            name: user.email.clone(),
            manufacturer: MANUFACTURER.to_string(),
        }
    }
}

/// `{("postnl", account_id)}`
pub fn account_identifiers(account_id: &str) -> BTreeSet<(String, String)> {
    BTreeSet::from([(DOMAIN.to_string(), account_id.to_string())])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorAttributes {
    pub enroute: Vec<Package>,
    pub delivered: Vec<Package>,
}

impl SensorAttributes {
    /// Split packages by delivery status, keeping source order
    pub fn from_packages(packages: &[Package]) -> Self {
        let (delivered, enroute) = packages.iter().cloned().partition(|p| p.delivered);
        Self { enroute, delivered }
    }
}

/// Published snapshot of one sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorState {
    pub unique_id: String,
    pub name: String,
    pub state: usize,
    pub unit_of_measurement: String,
    pub icon: String,
    pub attributes: SensorAttributes,
    pub device: DeviceInfo,
    pub last_updated: DateTime<Utc>,
}

/// Sensor counting the en-route packages of one shipment list
#[derive(Debug, Clone)]
pub struct DeliverySensor {
    role: ShipmentRole,
    name: String,
    unique_id: String,
    device: DeviceInfo,
    state: usize,
    attributes: SensorAttributes,
}

impl DeliverySensor {
    pub fn new(role: ShipmentRole, user: &UserInfo, data: &CoordinatorData) -> Self {
        let suffix = match role {
            ShipmentRole::Receiver => "delivery",
            ShipmentRole::Sender => "distribution",
        };

        let mut sensor = Self {
            role,
            name: format!("PostNL_{}", suffix),
            unique_id: format!("{}_{}", user.account_id, suffix),
            device: DeviceInfo::for_account(user),
            state: 0,
            attributes: SensorAttributes::default(),
        };
        sensor.apply(data);
        sensor
    }

    /// `PostNL_delivery`, backed by the receiver list
    pub fn receiver(user: &UserInfo, data: &CoordinatorData) -> Self {
        Self::new(ShipmentRole::Receiver, user, data)
    }

    /// `PostNL_distribution`, backed by the sender list
    pub fn sender(user: &UserInfo, data: &CoordinatorData) -> Self {
        Self::new(ShipmentRole::Sender, user, data)
    }

    pub fn role(&self) -> ShipmentRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn state(&self) -> usize {
        self.state
    }

    pub fn attributes(&self) -> &SensorAttributes {
        &self.attributes
    }

    /// Recompute state and attributes from new coordinator data
    pub fn handle_coordinator_update(&mut self, data: &CoordinatorData) -> SensorState {
        self.apply(data);
        self.snapshot()
    }

    /// Current state as a publishable snapshot
    pub fn snapshot(&self) -> SensorState {
        SensorState {
            unique_id: self.unique_id.clone(),
            name: self.name.clone(),
            state: self.state,
            unit_of_measurement: UNIT_OF_MEASUREMENT.to_string(),
            icon: ICON.to_string(),
            attributes: self.attributes.clone(),
            device: self.device.clone(),
            last_updated: Utc::now(),
        }
    }

    fn apply(&mut self, data: &CoordinatorData) {
        let packages = data.packages(self.role);
        self.attributes = SensorAttributes::from_packages(packages);
        self.state = self.attributes.enroute.len();
    }
}
