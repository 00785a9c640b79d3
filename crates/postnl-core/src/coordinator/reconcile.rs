//! Shipment reconciliation
//!
//! Merges one shipment-list entry with its (optional) track-and-trace
//! details into a [`Package`]. Pure: the detail fetch happens in the
//! coordinator, and only for shipments that are not delivered yet.

use crate::model::{
    Colli, DELIVERED_MESSAGE, Package, Shipment, TrackAndTraceDetails, UNKNOWN_MESSAGE,
};

/// Package for a shipment that is already delivered.
///
/// Planned and expected fields stay unset: a delivered shipment never
/// changes state again, so no detail lookup is made for it.
pub fn delivered_package(shipment: &Shipment) -> Package {
    Package {
        key: shipment.key.clone(),
        name: shipment.title.clone(),
        url: shipment.details_url.clone(),
        shipment_type: shipment.shipment_type.clone(),
        status_message: DELIVERED_MESSAGE.to_string(),
        delivered: true,
        delivery_date: shipment.delivered_time_stamp.clone(),
        delivery_address_type: shipment.delivery_address_type.clone(),
        ..Package::default()
    }
}

/// Find the colli for the shipment's barcode
pub fn find_colli<'a>(
    shipment: &Shipment,
    details: Option<&'a TrackAndTraceDetails>,
) -> Option<Colli<'a>> {
    let barcode = shipment.barcode.as_deref()?;
    details?.colli(barcode)
}

/// Reconcile a shipment with its track-and-trace details
///
/// | colli | route information | planned / expected fields          | status           |
/// |-------|-------------------|------------------------------------|------------------|
/// | yes   | yes               | from route information             | colli status     |
/// | yes   | no                | shipment window, expected unset    | colli status     |
/// | no    | -                 | shipment window, expected unset    | `Unknown`        |
///
/// Delivered shipments short-circuit to [`delivered_package`] whatever
/// `details` contains.
pub fn reconcile(shipment: &Shipment, details: Option<&TrackAndTraceDetails>) -> Package {
    if shipment.is_delivered() {
        return delivered_package(shipment);
    }

    let colli = find_colli(shipment, details);

    let (planned_date, planned_from, planned_to, expected_datetime) =
        match colli.and_then(|colli| colli.route_information()) {
            Some(route) => (
                route.planned_delivery_time(),
                route.planned_window_start(),
                route.planned_window_end(),
                route.expected_delivery_time(),
            ),
            None => (
                shipment.delivery_window_from.clone(),
                shipment.delivery_window_from.clone(),
                shipment.delivery_window_to.clone(),
                None,
            ),
        };

    let status_message = colli
        .map(|colli| colli.status_message())
        .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());

    Package {
        key: shipment.key.clone(),
        name: shipment.title.clone(),
        url: shipment.details_url.clone(),
        shipment_type: shipment.shipment_type.clone(),
        status_message,
        delivered: false,
        delivery_date: shipment.delivered_time_stamp.clone(),
        delivery_address_type: shipment.delivery_address_type.clone(),
        planned_date,
        planned_from,
        planned_to,
        expected_datetime,
    }
}
