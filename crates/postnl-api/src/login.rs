// # PostNL login service
//
// - Userinfo: GET `{login_base}/userinfo` with a bearer token
// - Token refresh: POST `{login_base}/token`, form-encoded refresh grant
//
// ## Security
//
// Tokens are never logged; only a short prefix appears in debug output.

use async_trait::async_trait;
use postnl_core::auth::{OAuthToken, redact};
use postnl_core::model::UserInfo;
use postnl_core::traits::{LoginApi, OAuth2Implementation};
use postnl_core::{Error, Result};

use crate::http;

const USERINFO_API: &str = "userinfo";
const OAUTH_API: &str = "oauth";

#[derive(Debug, Clone)]
pub struct PostnlLoginApi {
    base_url: String,
    client: reqwest::Client,
}

impl PostnlLoginApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: http::build_client()?,
        })
    }
}

#[async_trait]
impl LoginApi for PostnlLoginApi {
    async fn userinfo(&self, access_token: &str) -> Result<UserInfo> {
        let request = self
            .client
            .get(http::join(&self.base_url, "userinfo"))
            .bearer_auth(access_token);

        let response = http::send(USERINFO_API, request).await?;
        let response = http::check_status(USERINFO_API, response).await?;
        http::json(USERINFO_API, response).await
    }
}

/// OAuth2 refresh grant against the PostNL login service
#[derive(Debug, Clone)]
pub struct PostnlOAuth2 {
    token_url: String,
    client_id: String,
    client: reqwest::Client,
}

impl PostnlOAuth2 {
    pub fn new(login_base: &str, client_id: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(Error::config("OAuth client id cannot be empty"));
        }

        Ok(Self {
            token_url: http::join(login_base, "token"),
            client_id,
            client: http::build_client()?,
        })
    }
}

#[async_trait]
impl OAuth2Implementation for PostnlOAuth2 {
    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::auth("No refresh token available"))?;

        tracing::debug!("Requesting token refresh with {}", redact(refresh_token));

        let request = self.client.post(&self.token_url).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ]);

        let response = http::send(OAUTH_API, request).await?;
        let response = http::check_status(OAUTH_API, response).await?;
        let mut refreshed: OAuthToken = http::json(OAUTH_API, response).await?;

        if refreshed.access_token.is_empty() {
            return Err(Error::auth("Token endpoint returned no access token"));
        }
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }

        Ok(refreshed)
    }

    fn name(&self) -> &'static str {
        "postnl"
    }
}
