// # PostNL API Traits
//
// Defines the interfaces for the remote PostNL endpoints.
//
// ## Implementations
//
// - reqwest-backed clients: `postnl-api` crate
// - Call-counting test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use postnl_core::traits::ShipmentsApi;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let graphql = /* ShipmentsApi implementation */;
//
//     let shipments = graphql.shipments(&access_token).await?;
//     println!("{} incoming", shipments.receiver_shipments.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::OAuthToken;
use crate::model::{TrackAndTraceDetails, TrackedShipments, UserInfo};

/// GraphQL shipment-list and profile queries
///
/// Every call receives the access token explicitly. Clients hold no token
/// state of their own, so a refreshed token is picked up on the next call
/// without rebuilding the client.
///
/// # Errors
///
/// - Transport failure: [`crate::Error::Network`]
/// - Non-success HTTP status: [`crate::Error::Api`]
/// - HTTP 200 with a GraphQL `errors` array: [`crate::Error::GraphqlQuery`]
///
/// Implementations are single-shot: no retry, no caching. Retry and
/// refresh decisions belong to [`crate::auth::ConfigEntryAuth`] and the
/// update engine.
#[async_trait]
pub trait ShipmentsApi: Send + Sync {
    /// Fetch the receiver and sender shipment lists
    async fn shipments(&self, access_token: &str) -> Result<TrackedShipments, crate::Error>;

    /// Fetch the account profile.
    ///
    /// Used as a token-validity probe; the payload itself is not interpreted.
    async fn profile(&self, access_token: &str) -> Result<Value, crate::Error>;
}

/// Track-and-trace detail lookup by shipment key
#[async_trait]
pub trait TrackAndTraceApi: Send + Sync {
    /// Fetch the track-and-trace details for a shipment key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(details))`: the payload (its shape is not validated)
    /// - `Ok(None)`: the API has no details for this key
    /// - `Err(Error)`: transport or status failure
    async fn track_and_trace(
        &self,
        access_token: &str,
        key: &str,
    ) -> Result<Option<TrackAndTraceDetails>, crate::Error>;
}

/// Login service userinfo endpoint
#[async_trait]
pub trait LoginApi: Send + Sync {
    /// Fetch the account attributes for the token's owner
    ///
    /// An in-band failure is returned as `Ok` with [`UserInfo::error`] set;
    /// the caller decides how to treat it.
    async fn userinfo(&self, access_token: &str) -> Result<UserInfo, crate::Error>;
}

/// OAuth2 implementation used by [`crate::auth::OAuth2Session`]
///
/// Only the refresh grant is needed at runtime: the authorization-code
/// exchange happens once, out of band, when the entry is created.
#[async_trait]
pub trait OAuth2Implementation: Send + Sync {
    /// Exchange the token's refresh token for a new token
    ///
    /// The returned token must carry `expires_in`; the session stamps
    /// `expires_at` itself. If the server omits a new refresh token the
    /// implementation should carry over the old one.
    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, crate::Error>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}
