//! PostNL data coordinator
//!
//! One refresh cycle:
//!
//! 1. Validate (and if needed refresh) the OAuth token
//! 2. Fetch the receiver and sender shipment lists (GraphQL)
//! 3. Fetch track-and-trace details for every shipment that is not
//!    delivered yet, concurrently, and reconcile each into a [`Package`]
//! 4. Return the complete [`CoordinatorData`]
//!
//! The first failing detail fetch fails the whole cycle. The update engine
//! keeps the previous data visible in that case.

pub mod reconcile;

pub use reconcile::{delivered_package, reconcile};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, error, warn};

use crate::auth::ConfigEntryAuth;
use crate::error::{Error, Result};
use crate::model::{CoordinatorData, Package, Shipment};
use crate::traits::{Poller, ShipmentsApi, TrackAndTraceApi};

/// Produces [`CoordinatorData`] for one config entry
pub struct PostnlCoordinator {
    auth: Arc<ConfigEntryAuth>,
    graphql: Arc<dyn ShipmentsApi>,
    jouw: Arc<dyn TrackAndTraceApi>,
}

impl PostnlCoordinator {
    pub fn new(
        auth: Arc<ConfigEntryAuth>,
        graphql: Arc<dyn ShipmentsApi>,
        jouw: Arc<dyn TrackAndTraceApi>,
    ) -> Self {
        Self {
            auth,
            graphql,
            jouw,
        }
    }

    /// Turn one shipment into a package, fetching details when needed
    pub async fn transform_shipment(
        &self,
        access_token: &str,
        shipment: &Shipment,
    ) -> Result<Package> {
        debug!("Transforming shipment with key: {}", shipment.key);

        if shipment.is_delivered() {
            debug!("Shipment {} already delivered. Skipping API call.", shipment.key);
            return Ok(delivered_package(shipment));
        }

        debug!("Fetching track and trace details for shipment: {}", shipment.key);
        let details = self
            .jouw
            .track_and_trace(access_token, &shipment.key)
            .await
            .map_err(|e| {
                error!("Failed to process shipment {}: {}", shipment.key, e);
                cycle_error(e)
            })?;

        match &details {
            Some(details) if details.has_colli() => {}
            _ => warn!(
                "No colli data found for shipment: {}. Raw data: {:?}",
                shipment.key, details
            ),
        }

        Ok(reconcile(shipment, details.as_ref()))
    }

    /// Transform a list concurrently, preserving order
    async fn transform_all(
        &self,
        access_token: &str,
        shipments: &[Shipment],
    ) -> Result<Vec<Package>> {
        try_join_all(
            shipments
                .iter()
                .map(|shipment| self.transform_shipment(access_token, shipment)),
        )
        .await
    }
}

#[async_trait]
impl Poller for PostnlCoordinator {
    type Data = CoordinatorData;

    async fn refresh(&self) -> Result<CoordinatorData> {
        debug!("Starting data update for PostNL.");

        debug!("Checking and refreshing authentication token.");
        let access_token = self
            .auth
            .check_and_refresh_token()
            .await
            .map_err(cycle_error)?;

        debug!("Fetching shipments from GraphQL API.");
        let shipments = self
            .graphql
            .shipments(&access_token)
            .await
            .map_err(cycle_error)?;

        let receiver = self
            .transform_all(&access_token, &shipments.receiver_shipments)
            .await?;
        debug!("Processed {} receiver shipments.", receiver.len());

        let sender = self
            .transform_all(&access_token, &shipments.sender_shipments)
            .await?;
        debug!("Processed {} sender shipments.", sender.len());

        let data = CoordinatorData { receiver, sender };
        debug!("Total packages processed: {}", data.total());

        Ok(data)
    }

    fn name(&self) -> &str {
        "PostNL"
    }
}

/// Request failures fail the cycle; re-auth and local errors pass through
fn cycle_error(e: Error) -> Error {
    match e {
        Error::UpdateFailed(_) | Error::ReauthRequired(_) => e,
        e if e.is_request_error() => {
            Error::update_failed(format!("Unable to update PostNL data: {}", e))
        }
        e => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_mapping() {
        assert!(matches!(
            cycle_error(Error::network("refused")),
            Error::UpdateFailed(_)
        ));
        assert!(matches!(
            cycle_error(Error::reauth("401")),
            Error::ReauthRequired(_)
        ));
        assert!(matches!(
            cycle_error(Error::config("bad")),
            Error::Config(_)
        ));
    }
}
