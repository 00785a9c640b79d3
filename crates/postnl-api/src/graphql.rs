// # PostNL GraphQL client
//
// Shipment lists and the account profile.
//
// ## API Reference
//
// - POST `{graphql_url}` with `{"query": "..."}` and a bearer token
// - HTTP 200 with an `errors` array is a query error, not a transport error

use async_trait::async_trait;
use postnl_core::model::TrackedShipments;
use postnl_core::traits::ShipmentsApi;
use postnl_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::http;

const API_NAME: &str = "graphql";

const SHIPMENTS_QUERY: &str = "query {
  trackedShipments {
    receiverShipments {
      key title barcode deliveredTimeStamp deliveryWindowFrom deliveryWindowTo
      delivered deliveryAddressType shipmentType detailsUrl
    }
    senderShipments {
      key title barcode deliveredTimeStamp deliveryWindowFrom deliveryWindowTo
      delivered deliveryAddressType shipmentType detailsUrl
    }
  }
}";

const PROFILE_QUERY: &str = "query {
  profile {
    email
    firstName
    lastName
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentsData {
    #[serde(default)]
    tracked_shipments: TrackedShipments,
}

/// GraphQL client
///
/// Holds no token: every call receives the current access token.
#[derive(Debug, Clone)]
pub struct PostnlGraphql {
    url: String,
    client: reqwest::Client,
}

impl PostnlGraphql {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: http::build_client()?,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, access_token: &str, query: &str) -> Result<T> {
        let request = self
            .client
            .post(&self.url)
            .bearer_auth(access_token)
            .json(&json!({ "query": query }));

        let response = http::send(API_NAME, request).await?;
        let response = http::check_status(API_NAME, response).await?;
        let body: GraphqlResponse<T> = http::json(API_NAME, response).await?;

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::graphql(messages.join("; ")));
        }

        body.data
            .ok_or_else(|| Error::graphql("Response contained no data"))
    }
}

#[async_trait]
impl ShipmentsApi for PostnlGraphql {
    async fn shipments(&self, access_token: &str) -> Result<TrackedShipments> {
        let data: ShipmentsData = self.execute(access_token, SHIPMENTS_QUERY).await?;
        tracing::debug!(
            "GraphQL returned {} receiver and {} sender shipments",
            data.tracked_shipments.receiver_shipments.len(),
            data.tracked_shipments.sender_shipments.len()
        );
        Ok(data.tracked_shipments)
    }

    async fn profile(&self, access_token: &str) -> Result<Value> {
        self.execute(access_token, PROFILE_QUERY).await
    }
}
