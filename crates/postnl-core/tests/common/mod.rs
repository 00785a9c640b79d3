//! Test doubles and common utilities for contract tests
//!
//! Every double counts its calls so tests can assert which remote
//! endpoints a code path touched, not only what it returned.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use postnl_core::auth::{OAuthToken, unix_now};
use postnl_core::entry::EntryServices;
use postnl_core::error::{Error, Result};
use postnl_core::model::{Shipment, TrackAndTraceDetails, TrackedShipments, UserInfo};
use postnl_core::sensor::SensorState;
use postnl_core::state::MemoryTokenStore;
use postnl_core::traits::{
    LoginApi, OAuth2Implementation, ShipmentsApi, StatePublisher, StoredEntry, TokenStore,
    TrackAndTraceApi,
};
use serde_json::{Value, json};

pub const ACCOUNT_ID: &str = "acc-1";
pub const ENTRY_ID: &str = "entry-1";

/// How the next profile probe answers
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Ok,
    QueryError,
    Status(u16),
    Network,
}

impl ProbeOutcome {
    fn into_result(self) -> Result<Value> {
        match self {
            ProbeOutcome::Ok => Ok(json!({ "profile": { "email": "user@example.com" } })),
            ProbeOutcome::QueryError => Err(Error::graphql("token expired")),
            ProbeOutcome::Status(status) => Err(Error::api("graphql", status, "rejected")),
            ProbeOutcome::Network => Err(Error::network("connection refused")),
        }
    }
}

/// Shipment list and profile probe
#[derive(Default)]
pub struct MockShipmentsApi {
    shipments: Mutex<TrackedShipments>,
    probes: Mutex<VecDeque<ProbeOutcome>>,
    fail_shipments: AtomicBool,
    shipments_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl MockShipmentsApi {
    pub fn new(shipments: TrackedShipments) -> Arc<Self> {
        Arc::new(Self {
            shipments: Mutex::new(shipments),
            ..Self::default()
        })
    }

    /// Queue probe outcomes; once drained, probes succeed
    pub fn queue_probes(&self, outcomes: impl IntoIterator<Item = ProbeOutcome>) {
        self.probes.lock().unwrap().extend(outcomes);
    }

    pub fn set_shipments(&self, shipments: TrackedShipments) {
        *self.shipments.lock().unwrap() = shipments;
    }

    pub fn set_fail_shipments(&self, fail: bool) {
        self.fail_shipments.store(fail, Ordering::SeqCst);
    }

    pub fn shipments_calls(&self) -> usize {
        self.shipments_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShipmentsApi for MockShipmentsApi {
    async fn shipments(&self, access_token: &str) -> Result<TrackedShipments> {
        self.shipments_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(access_token.to_string());

        if self.fail_shipments.load(Ordering::SeqCst) {
            return Err(Error::network("connection reset"));
        }
        Ok(self.shipments.lock().unwrap().clone())
    }

    async fn profile(&self, _access_token: &str) -> Result<Value> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .probes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProbeOutcome::Ok);
        outcome.into_result()
    }
}

/// Track-and-trace details by shipment key
#[derive(Default)]
pub struct MockTrackAndTrace {
    details: Mutex<HashMap<String, Value>>,
    failing_keys: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockTrackAndTrace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, details: Value) {
        self.details.lock().unwrap().insert(key.to_string(), details);
    }

    pub fn fail_for(&self, key: &str) {
        self.failing_keys.lock().unwrap().push(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TrackAndTraceApi for MockTrackAndTrace {
    async fn track_and_trace(
        &self,
        _access_token: &str,
        key: &str,
    ) -> Result<Option<TrackAndTraceDetails>> {
        self.calls.lock().unwrap().push(key.to_string());

        if self.failing_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(Error::api("track-and-trace", 502, "bad gateway"));
        }

        Ok(self
            .details
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .map(TrackAndTraceDetails::new))
    }
}

/// Userinfo endpoint
pub struct MockLogin {
    response: Mutex<Result<UserInfo>>,
    calls: AtomicUsize,
}

impl MockLogin {
    pub fn new(userinfo: UserInfo) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(userinfo)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Err(Error::network("login unreachable"))),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginApi for MockLogin {
    async fn userinfo(&self, _access_token: &str) -> Result<UserInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.response.lock().unwrap() {
            Ok(info) => Ok(info.clone()),
            Err(e) => Err(Error::network(e.to_string())),
        }
    }
}

/// Refresh grant that hands out numbered access tokens
#[derive(Default)]
pub struct MockOAuth2 {
    refresh_calls: AtomicUsize,
    reject_with: Mutex<Option<u16>>,
}

impl MockOAuth2 {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_with(&self, status: u16) {
        *self.reject_with.lock().unwrap() = Some(status);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuth2Implementation for MockOAuth2 {
    async fn refresh_token(&self, _token: &OAuthToken) -> Result<OAuthToken> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(status) = *self.reject_with.lock().unwrap() {
            return Err(Error::api("oauth", status, "invalid_grant"));
        }

        let mut token = OAuthToken::from_refresh_token(format!("refresh-{}", call));
        token.access_token = format!("access-{}", call);
        token.expires_in = Some(3600);
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Records every published sensor state
#[derive(Default)]
pub struct RecordingPublisher {
    states: Mutex<Vec<SensorState>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<SensorState> {
        self.states.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    /// Most recent state published for a unique id
    pub fn latest(&self, unique_id: &str) -> Option<SensorState> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.unique_id == unique_id)
            .cloned()
    }
}

#[async_trait]
impl StatePublisher for RecordingPublisher {
    async fn publish(&self, state: &SensorState) -> Result<()> {
        self.states.lock().unwrap().push(state.clone());
        Ok(())
    }
}

/// Store whose writes always fail
#[derive(Default)]
pub struct FailingStore {
    save_calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for FailingStore {
    async fn load(&self, _entry_id: &str) -> Result<Option<StoredEntry>> {
        Ok(None)
    }

    async fn save(&self, _entry_id: &str, _entry: &StoredEntry) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::token_store("disk full"))
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// All doubles for one entry
pub struct Harness {
    pub graphql: Arc<MockShipmentsApi>,
    pub jouw: Arc<MockTrackAndTrace>,
    pub login: Arc<MockLogin>,
    pub oauth: Arc<MockOAuth2>,
    pub store: Arc<MemoryTokenStore>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Harness {
    pub fn new(shipments: TrackedShipments) -> Self {
        Self {
            graphql: MockShipmentsApi::new(shipments),
            jouw: MockTrackAndTrace::new(),
            login: MockLogin::new(user()),
            oauth: MockOAuth2::new(),
            store: Arc::new(MemoryTokenStore::new()),
            publisher: RecordingPublisher::new(),
        }
    }

    pub fn services(&self) -> EntryServices {
        EntryServices {
            oauth: self.oauth.clone(),
            graphql: self.graphql.clone(),
            jouw: self.jouw.clone(),
            login: self.login.clone(),
            store: self.store.clone() as Arc<dyn TokenStore>,
            publisher: self.publisher.clone(),
        }
    }
}

pub fn user() -> UserInfo {
    UserInfo::new(ACCOUNT_ID, Some("user@example.com".to_string()))
}

/// A token that is valid for another hour
pub fn valid_token() -> OAuthToken {
    let mut token = OAuthToken::from_refresh_token("refresh-0");
    token.access_token = "access-0".to_string();
    token.expires_in = Some(3600);
    token.stamp_expiry(unix_now());
    token
}

pub fn shipment(key: &str, barcode: &str, delivered: bool) -> Shipment {
    Shipment {
        key: key.to_string(),
        title: Some(format!("Parcel {}", key)),
        barcode: Some(barcode.to_string()),
        delivered: Some(delivered),
        delivered_time_stamp: delivered.then(|| "2024-05-01T10:00:00+02:00".to_string()),
        delivery_window_from: Some("2024-05-02T09:00:00+02:00".to_string()),
        delivery_window_to: Some("2024-05-02T13:00:00+02:00".to_string()),
        ..Shipment::default()
    }
}

/// Track-and-trace payload with a single colli
pub fn colli_details(barcode: &str, message: &str, route: Option<Value>) -> Value {
    let mut colli = json!({ "statusPhase": { "message": message } });
    if let Some(route) = route {
        colli["routeInformation"] = route;
    }
    let mut by_barcode = serde_json::Map::new();
    by_barcode.insert(barcode.to_string(), colli);
    json!({ "colli": by_barcode })
}

/// Poll `condition` until it holds or a second has passed
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
