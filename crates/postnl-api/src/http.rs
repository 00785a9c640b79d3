// Shared HTTP plumbing for the PostNL clients.
//
// Every client is single-shot: one request per call, no retry, no caching.
// Status codes are mapped into `Error::Api` so the auth layer can react to
// 400/401 and the coordinator can fail the cycle on everything else.

use std::time::Duration;

use postnl_core::{Error, Result};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Default HTTP timeout for API requests (30 seconds)
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with the default timeout
pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a request, mapping transport failures to `Error::Network`
pub(crate) async fn send(api: &str, request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| Error::network(format!("{} request failed: {}", api, e)))
}

/// Turn a non-success response into `Error::Api`
pub(crate) async fn check_status(api: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    let message = match status.as_u16() {
        400 | 401 => format!("Credentials rejected: {}", error_text),
        403 => format!("Access denied: {}", error_text),
        429 => "Rate limit exceeded. Please retry later.".to_string(),
        500..=599 => format!("Server error (transient): {}", error_text),
        _ => error_text,
    };

    Err(Error::api(api, status.as_u16(), message))
}

/// Parse a JSON body; malformed payloads count as API failures
pub(crate) async fn json<T: DeserializeOwned>(api: &str, response: Response) -> Result<T> {
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| Error::api(api, status, format!("Failed to parse response: {}", e)))
}
