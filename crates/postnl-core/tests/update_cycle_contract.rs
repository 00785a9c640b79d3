//! Contract Test: Periodic Updates
//!
//! Verifies the coordinator of a loaded entry across several cycles.
//!
//! Constraints verified:
//! - A failing cycle keeps the last data and the published sensor state
//! - A successful cycle republishes both sensors
//! - Credential rejection during polling is reported as re-auth
//! - The polling loop stops on the shutdown signal

mod common;

use common::*;
use postnl_core::config::{EngineConfig, EntryOptions};
use postnl_core::engine::CoordinatorEvent;
use postnl_core::entry::{ConfigEntry, EntryContext, setup_entry};
use postnl_core::error::Error;
use postnl_core::model::TrackedShipments;
use tokio::sync::{mpsc, oneshot};

async fn loaded(harness: &Harness) -> (EntryContext, mpsc::Receiver<CoordinatorEvent>) {
    let ctx = EntryContext::new();
    let entry = ConfigEntry::new(ENTRY_ID, valid_token(), EntryOptions::default());
    let events = setup_entry(&ctx, &entry, &EngineConfig::default(), &harness.services())
        .await
        .unwrap();
    (ctx, events)
}

fn drain(events: &mut mpsc::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn failing_cycle_keeps_last_data() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![shipment("K1", "3S1", false)],
        sender_shipments: Vec::new(),
    });
    let (ctx, mut events) = loaded(&harness).await;
    let coordinator = ctx.coordinator(ENTRY_ID).await.unwrap();
    let platform = ctx.platform(ENTRY_ID).await.unwrap();
    let before = platform.states().await;
    drain(&mut events);

    harness.graphql.set_fail_shipments(true);
    let result = coordinator.refresh().await;

    assert!(matches!(result, Err(Error::UpdateFailed(_))));
    assert!(!coordinator.last_update_success());
    assert_eq!(coordinator.data().unwrap().receiver.len(), 1, "Last data is kept");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(platform.states().await, before);
    assert_eq!(harness.publisher.count(), 2, "Nothing is republished");

    let drained = drain(&mut events);
    assert!(matches!(
        drained.as_slice(),
        [CoordinatorEvent::UpdateFailed { .. }]
    ));
}

#[tokio::test]
async fn successful_cycle_republishes_sensors() {
    let harness = Harness::new(TrackedShipments {
        receiver_shipments: vec![shipment("K1", "3S1", false)],
        sender_shipments: Vec::new(),
    });
    let (ctx, _events) = loaded(&harness).await;
    let coordinator = ctx.coordinator(ENTRY_ID).await.unwrap();
    assert_eq!(harness.publisher.latest("acc-1_delivery").unwrap().state, 1);

    harness.graphql.set_shipments(TrackedShipments {
        receiver_shipments: vec![
            shipment("K1", "3S1", false),
            shipment("K2", "3S2", false),
            shipment("K3", "3S3", false),
        ],
        sender_shipments: vec![shipment("K4", "3S4", false)],
    });
    coordinator.refresh().await.unwrap();

    let republished = wait_until(|| {
        harness.publisher.latest("acc-1_delivery").map(|s| s.state) == Some(3)
            && harness.publisher.latest("acc-1_distribution").map(|s| s.state) == Some(1)
    })
    .await;
    assert!(republished, "Both sensors follow the new data");
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn rejected_credentials_during_polling_request_reauth() {
    let harness = Harness::new(TrackedShipments::default());
    let (ctx, mut events) = loaded(&harness).await;
    let coordinator = ctx.coordinator(ENTRY_ID).await.unwrap();
    drain(&mut events);

    harness.graphql.queue_probes([ProbeOutcome::Status(401)]);
    let result = coordinator.refresh().await;

    assert!(matches!(result, Err(Error::ReauthRequired(_))));
    assert_eq!(harness.graphql.shipments_calls(), 1, "Only the setup cycle fetched");
    assert!(ctx.auth(ENTRY_ID).await.unwrap().reauth_requested());

    let drained = drain(&mut events);
    assert!(matches!(
        drained.as_slice(),
        [CoordinatorEvent::ReauthRequired { .. }]
    ));
}

#[tokio::test]
async fn polling_loop_stops_on_shutdown() {
    let harness = Harness::new(TrackedShipments::default());
    let (ctx, mut events) = loaded(&harness).await;
    let coordinator = ctx.coordinator(ENTRY_ID).await.unwrap();
    drain(&mut events);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let runner = coordinator.clone();
    let handle = tokio::spawn(async move { runner.run_with_shutdown(shutdown_rx).await });

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let drained = drain(&mut events);
    assert!(matches!(
        drained.first(),
        Some(CoordinatorEvent::Started { interval_secs: 90, .. })
    ));
    assert!(matches!(drained.last(), Some(CoordinatorEvent::Stopped { .. })));
    assert_eq!(
        harness.graphql.shipments_calls(),
        1,
        "No cycle ran before the first interval elapsed"
    );
}
