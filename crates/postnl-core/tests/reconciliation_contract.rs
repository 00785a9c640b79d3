//! Contract Test: One Polling Cycle
//!
//! Verifies what a single `PostnlCoordinator::refresh()` fetches and how it
//! turns shipments into packages.
//!
//! Constraints verified:
//! - Delivered shipments never trigger a track-and-trace lookup
//! - Route information wins over the shipment's delivery window
//! - Missing colli data yields "Unknown" with the shipment window
//! - Package order follows the shipment list order
//! - One failing detail lookup fails the whole cycle

mod common;

use std::sync::Arc;

use common::*;
use postnl_core::auth::{ConfigEntryAuth, OAuth2Session};
use postnl_core::coordinator::PostnlCoordinator;
use postnl_core::error::Error;
use postnl_core::model::{DELIVERED_MESSAGE, TrackedShipments, UNKNOWN_MESSAGE};
use postnl_core::traits::Poller;
use serde_json::json;

fn coordinator(harness: &Harness) -> PostnlCoordinator {
    let session = Arc::new(OAuth2Session::new(
        ENTRY_ID,
        valid_token(),
        harness.oauth.clone(),
        harness.store.clone(),
    ));
    let auth = Arc::new(ConfigEntryAuth::new(session, harness.graphql.clone()));
    PostnlCoordinator::new(auth, harness.graphql.clone(), harness.jouw.clone())
}

#[tokio::test]
async fn delivered_shipments_skip_detail_lookup() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![shipment("K1", "3S1", true), shipment("K2", "3S2", true)],
        sender_shipments: vec![shipment("K3", "3S3", true)],
    });

    let data = coordinator(&harness).refresh().await.unwrap();

    assert_eq!(harness.jouw.call_count(), 0, "No detail lookups for delivered shipments");
    assert_eq!(data.total(), 3);
    for package in data.receiver.iter().chain(&data.sender) {
        assert!(package.delivered);
        assert_eq!(package.status_message, DELIVERED_MESSAGE);
        assert_eq!(package.planned_from, None);
        assert_eq!(package.planned_to, None);
        assert_eq!(package.expected_datetime, None);
    }
}

#[tokio::test]
async fn enroute_shipments_are_reconciled_with_details() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![
            shipment("K1", "3S1", false),
            shipment("K2", "3S2", false),
            shipment("K3", "3S3", false),
        ],
        sender_shipments: Vec::new(),
    });

    harness.jouw.insert(
        "K1",
        colli_details(
            "3S1",
            "Pakket is onderweg",
            Some(json!({
                "plannedDeliveryTime": "2024-05-02T11:30:00+02:00",
                "plannedDeliveryTimeWindow": {
                    "startDateTime": "2024-05-02T11:00:00+02:00",
                    "endDateTime": "2024-05-02T12:00:00+02:00"
                },
                "expectedDeliveryTime": "2024-05-02T11:40:00+02:00"
            })),
        ),
    );
    harness
        .jouw
        .insert("K2", colli_details("3S2", "Pakket is aangemeld", None));
    // K3 has no details at all

    let data = coordinator(&harness).refresh().await.unwrap();
    assert_eq!(harness.jouw.call_count(), 3);

    let keys: Vec<_> = data.receiver.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["K1", "K2", "K3"], "Order follows the shipment list");

    let with_route = &data.receiver[0];
    assert_eq!(with_route.status_message, "Pakket is onderweg");
    assert_eq!(with_route.planned_date.as_deref(), Some("2024-05-02T11:30:00+02:00"));
    assert_eq!(with_route.planned_from.as_deref(), Some("2024-05-02T11:00:00+02:00"));
    assert_eq!(with_route.planned_to.as_deref(), Some("2024-05-02T12:00:00+02:00"));
    assert_eq!(with_route.expected_datetime.as_deref(), Some("2024-05-02T11:40:00+02:00"));

    let without_route = &data.receiver[1];
    assert_eq!(without_route.status_message, "Pakket is aangemeld");
    assert_eq!(without_route.planned_from.as_deref(), Some("2024-05-02T09:00:00+02:00"));
    assert_eq!(without_route.planned_to.as_deref(), Some("2024-05-02T13:00:00+02:00"));
    assert_eq!(without_route.expected_datetime, None);

    let unknown = &data.receiver[2];
    assert_eq!(unknown.status_message, UNKNOWN_MESSAGE);
    assert_eq!(unknown.planned_from.as_deref(), Some("2024-05-02T09:00:00+02:00"));
    assert_eq!(unknown.expected_datetime, None);
}

#[tokio::test]
async fn mixed_lists_only_look_up_enroute() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![shipment("K1", "3S1", true), shipment("K2", "3S2", false)],
        sender_shipments: vec![shipment("K3", "3S3", false)],
    });

    let data = coordinator(&harness).refresh().await.unwrap();

    let mut calls = harness.jouw.calls();
    calls.sort();
    assert_eq!(calls, ["K2", "K3"]);
    assert_eq!(data.receiver.len(), 2);
    assert_eq!(data.sender.len(), 1);
}

#[tokio::test]
async fn failing_detail_lookup_fails_the_cycle() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![shipment("K1", "3S1", false), shipment("K2", "3S2", false)],
        sender_shipments: Vec::new(),
    });
    harness.jouw.fail_for("K2");

    let result = coordinator(&harness).refresh().await;
    assert!(matches!(result, Err(Error::UpdateFailed(_))));
}

#[tokio::test]
async fn failing_shipment_list_fails_the_cycle() {
    let harness = Harness::new(TrackedShipments::default());
    harness.graphql.set_fail_shipments(true);

    let result = coordinator(&harness).refresh().await;
    assert!(matches!(result, Err(Error::UpdateFailed(_))));
    assert_eq!(harness.jouw.call_count(), 0);
}

#[tokio::test]
async fn cycle_validates_token_before_fetching() {
    let harness = Harness::new(TrackedShipments::default());

    coordinator(&harness).refresh().await.unwrap();

    assert_eq!(harness.graphql.profile_calls(), 1);
    assert_eq!(harness.graphql.shipments_calls(), 1);
    assert_eq!(harness.graphql.tokens_seen(), ["access-0"]);
    assert_eq!(harness.oauth.refresh_calls(), 0, "A valid token is not refreshed");
}
