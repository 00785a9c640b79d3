//! Domain and wire types
//!
//! - [`Shipment`]: one entry of the GraphQL `trackedShipments` lists
//! - [`TrackAndTraceDetails`]: the track-and-trace payload for one shipment key
//! - [`Package`]: the reconciled record exposed through the sensors
//! - [`CoordinatorData`]: one polling cycle's output
//! - [`UserInfo`]: account attributes fetched once at setup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status message used for shipments that are already delivered
pub const DELIVERED_MESSAGE: &str = "Pakket is bezorgd";

/// Status message used when no colli status is available
pub const UNKNOWN_MESSAGE: &str = "Unknown";

/// A tracked shipment as reported by the shipment-list query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shipment {
    pub key: String,
    pub title: Option<String>,
    pub details_url: Option<String>,
    pub shipment_type: Option<String>,
    pub delivered: Option<bool>,
    pub delivered_time_stamp: Option<String>,
    pub delivery_address_type: Option<String>,
    pub barcode: Option<String>,
    pub delivery_window_from: Option<String>,
    pub delivery_window_to: Option<String>,
}

impl Shipment {
    pub fn is_delivered(&self) -> bool {
        self.delivered.unwrap_or(false)
    }
}

/// Receiver and sender shipment lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackedShipments {
    pub receiver_shipments: Vec<Shipment>,
    pub sender_shipments: Vec<Shipment>,
}

/// Track-and-trace payload for one shipment key.
///
/// The payload shape is not guaranteed, so it is kept as raw JSON and read
/// through guarded accessors. A missing or malformed sub-record reads as
/// absent rather than failing the whole cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackAndTraceDetails(pub Value);

impl TrackAndTraceDetails {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up the colli for a barcode
    pub fn colli(&self, barcode: &str) -> Option<Colli<'_>> {
        self.0
            .get("colli")?
            .as_object()?
            .get(barcode)?
            .as_object()
            .map(Colli)
    }

    /// Whether the payload carries a `colli` mapping at all
    pub fn has_colli(&self) -> bool {
        self.0.get("colli").is_some_and(Value::is_object)
    }
}

/// Borrowed view over one colli record
#[derive(Debug, Clone, Copy)]
pub struct Colli<'a>(&'a Map<String, Value>);

impl<'a> Colli<'a> {
    /// `statusPhase.message`, or [`UNKNOWN_MESSAGE`] when the phase is
    /// missing, not an object, or has no string message
    pub fn status_message(&self) -> String {
        self.0
            .get("statusPhase")
            .and_then(Value::as_object)
            .and_then(|phase| phase.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_MESSAGE)
            .to_string()
    }

    /// Route information, if present and non-empty
    pub fn route_information(&self) -> Option<RouteInformation<'a>> {
        self.0
            .get("routeInformation")
            .and_then(Value::as_object)
            .filter(|route| !route.is_empty())
            .map(RouteInformation)
    }
}

/// Borrowed view over a colli's route information
#[derive(Debug, Clone, Copy)]
pub struct RouteInformation<'a>(&'a Map<String, Value>);

impl RouteInformation<'_> {
    pub fn planned_delivery_time(&self) -> Option<String> {
        string_field(self.0, "plannedDeliveryTime")
    }

    pub fn planned_window_start(&self) -> Option<String> {
        self.planned_window()
            .and_then(|window| string_field(window, "startDateTime"))
    }

    pub fn planned_window_end(&self) -> Option<String> {
        self.planned_window()
            .and_then(|window| string_field(window, "endDateTime"))
    }

    pub fn expected_delivery_time(&self) -> Option<String> {
        string_field(self.0, "expectedDeliveryTime")
    }

    fn planned_window(&self) -> Option<&Map<String, Value>> {
        self.0
            .get("plannedDeliveryTimeWindow")
            .and_then(Value::as_object)
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// One reconciled shipment.
///
/// Recreated wholesale on every polling cycle; the field names are the
/// sensor attribute keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub key: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub shipment_type: Option<String>,
    pub status_message: String,
    pub delivered: bool,
    pub delivery_date: Option<String>,
    pub delivery_address_type: Option<String>,
    pub planned_date: Option<String>,
    pub planned_from: Option<String>,
    pub planned_to: Option<String>,
    pub expected_datetime: Option<String>,
}

/// Which shipment list a sensor reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentRole {
    /// The account is the receiver
    Receiver,
    /// The account is the sender
    Sender,
}

/// Output of one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorData {
    pub receiver: Vec<Package>,
    pub sender: Vec<Package>,
}

impl CoordinatorData {
    pub fn packages(&self, role: ShipmentRole) -> &[Package] {
        match role {
            ShipmentRole::Receiver => &self.receiver,
            ShipmentRole::Sender => &self.sender,
        }
    }

    pub fn total(&self) -> usize {
        self.receiver.len() + self.sender.len()
    }
}

/// Account attributes returned by the login userinfo endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Present when the endpoint reports a failure in-band
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserInfo {
    pub fn new(account_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            account_id: account_id.into(),
            email,
            error: None,
            extra: Map::new(),
        }
    }
}
