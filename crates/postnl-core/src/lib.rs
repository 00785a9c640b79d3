// # postnl-core
//
// Core library for PostNL parcel tracking.
//
// ## Architecture Overview
//
// - **ShipmentsApi / TrackAndTraceApi / LoginApi**: Traits for the remote PostNL APIs
// - **OAuth2Session / ConfigEntryAuth**: Token refresh and validity probing
// - **PostnlCoordinator**: One polling cycle (shipments, details, reconciliation)
// - **UpdateCoordinator**: Interval scheduling, last-good data, subscribers
// - **DeliverySensor**: Aggregate sensors published through a StatePublisher
// - **TokenStore**: Persistent entry data (token and options)
//
// ## Design Principles
//
// 1. **Library-First**: HTTP clients and the daemon live in separate crates
// 2. **Traits at the seams**: every remote or host capability is injectable
// 3. **Last good state**: a failing cycle never clears published data

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod entry;
pub mod error;
pub mod model;
pub mod options;
pub mod registry;
pub mod sensor;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use auth::{ConfigEntryAuth, OAuth2Session, OAuthToken};
pub use config::{EndpointConfig, EntryOptions, PostnlConfig, TokenStoreConfig};
pub use coordinator::PostnlCoordinator;
pub use engine::{CoordinatorEvent, UpdateCoordinator};
pub use entry::{ConfigEntry, EntryContext, EntryServices, setup_entry, unload_entry};
pub use error::{Error, Result};
pub use model::{CoordinatorData, Package, Shipment, TrackedShipments, UserInfo};
pub use options::{FlowResult, OptionsFlow};
pub use sensor::{DeliverySensor, SensorState};
pub use state::{FileTokenStore, MemoryTokenStore};
pub use traits::{
    LoginApi, OAuth2Implementation, Poller, ShipmentsApi, StatePublisher, TokenStore,
    TrackAndTraceApi,
};
