// # PostNL track-and-trace client
//
// GET `{jouw_base}/track-and-trace/api/trackAndTrace/{key}?language=nl`
//
// The payload is passed through untouched; the reconciliation layer reads
// it defensively. A 404 means "no details for this key" and is not an
// error.

use async_trait::async_trait;
use postnl_core::Result;
use postnl_core::model::TrackAndTraceDetails;
use postnl_core::traits::TrackAndTraceApi;
use postnl_core::Error;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::http;

const API_NAME: &str = "track-and-trace";

#[derive(Debug, Clone)]
pub struct PostnlJouwApi {
    base_url: Url,
    client: reqwest::Client,
}

impl PostnlJouwApi {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref()).map_err(|e| {
            Error::config(format!("Invalid track-and-trace URL {}: {}", base_url.as_ref(), e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Track-and-trace URL cannot be a base: {}",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            client: http::build_client()?,
        })
    }

    /// The key becomes one percent-encoded path segment
    fn details_url(&self, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Track-and-trace URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["track-and-trace", "api", "trackAndTrace", key]);
        Ok(url)
    }
}

#[async_trait]
impl TrackAndTraceApi for PostnlJouwApi {
    async fn track_and_trace(
        &self,
        access_token: &str,
        key: &str,
    ) -> Result<Option<TrackAndTraceDetails>> {
        let request = self
            .client
            .get(self.details_url(key)?)
            .query(&[("language", "nl")])
            .bearer_auth(access_token);

        let response = http::send(API_NAME, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("No track and trace details for {}", key);
            return Ok(None);
        }

        let response = http::check_status(API_NAME, response).await?;
        let value: Value = http::json(API_NAME, response).await?;
        Ok(Some(TrackAndTraceDetails::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_details_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track-and-trace/api/trackAndTrace/KEY-1"))
            .and(query_param("language", "nl"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "colli": { "3S1": { "statusPhase": { "message": "Onderweg" } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = PostnlJouwApi::new(server.uri()).unwrap();
        let details = api.track_and_trace("tok", "KEY-1").await.unwrap().unwrap();

        let colli = details.colli("3S1").unwrap();
        assert_eq!(colli.status_message(), "Onderweg");
    }

    #[tokio::test]
    async fn test_key_is_one_encoded_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/base/track-and-trace/api/trackAndTrace/KEY%201%2F2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "colli": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let api = PostnlJouwApi::new(format!("{}/base/", server.uri())).unwrap();
        assert!(api.track_and_trace("tok", "KEY 1/2").await.unwrap().is_some());
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        for base in ["not a url", "mailto:someone@example.com"] {
            assert!(matches!(
                PostnlJouwApi::new(base),
                Err(Error::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = PostnlJouwApi::new(server.uri()).unwrap();
        assert!(api.track_and_trace("tok", "KEY-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = PostnlJouwApi::new(server.uri()).unwrap();
        let err = api.track_and_trace("tok", "KEY-1").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
}
