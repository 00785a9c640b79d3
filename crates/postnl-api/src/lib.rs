// # PostNL API clients
//
// reqwest-backed implementations of the `postnl-core` API traits:
//
// - [`PostnlGraphql`]: shipment lists and profile probe (`ShipmentsApi`)
// - [`PostnlJouwApi`]: track-and-trace details (`TrackAndTraceApi`)
// - [`PostnlLoginApi`]: userinfo (`LoginApi`)
// - [`PostnlOAuth2`]: refresh grant (`OAuth2Implementation`)
//
// ## Behavior
//
// - One HTTP request per call; retry and refresh decisions are made by
//   `ConfigEntryAuth` and the update engine
// - HTTP timeout of 30 seconds
// - Non-success status: `Error::Api { status }`
// - GraphQL `errors` in a 200 response: `Error::GraphqlQuery`
// - Track-and-trace 404: `Ok(None)`
//
// ## Security Requirements
//
// - Access and refresh tokens NEVER appear in logs or error messages
// - Clients hold no token state; the current token is passed per call

mod http;

pub mod graphql;
pub mod jouw;
pub mod login;

pub use graphql::PostnlGraphql;
pub use jouw::PostnlJouwApi;
pub use login::{PostnlLoginApi, PostnlOAuth2};

use std::sync::Arc;

use postnl_core::config::PostnlConfig;
use postnl_core::entry::EntryServices;
use postnl_core::traits::{StatePublisher, TokenStore};
use postnl_core::Result;

/// All PostNL clients for one configuration
#[derive(Debug, Clone)]
pub struct PostnlClients {
    pub oauth: Arc<PostnlOAuth2>,
    pub graphql: Arc<PostnlGraphql>,
    pub jouw: Arc<PostnlJouwApi>,
    pub login: Arc<PostnlLoginApi>,
}

impl PostnlClients {
    /// Build every client from the configured endpoints
    pub fn from_config(config: &PostnlConfig) -> Result<Self> {
        let endpoints = &config.endpoints;
        Ok(Self {
            oauth: Arc::new(PostnlOAuth2::new(
                &endpoints.login_url,
                config.oauth.client_id.clone(),
            )?),
            graphql: Arc::new(PostnlGraphql::new(endpoints.graphql_url.clone())?),
            jouw: Arc::new(PostnlJouwApi::new(endpoints.jouw_url.clone())?),
            login: Arc::new(PostnlLoginApi::new(endpoints.login_url.clone())?),
        })
    }

    /// Combine with a store and publisher into entry services
    pub fn into_services(
        self,
        store: Arc<dyn TokenStore>,
        publisher: Arc<dyn StatePublisher>,
    ) -> EntryServices {
        EntryServices {
            oauth: self.oauth,
            graphql: self.graphql,
            jouw: self.jouw,
            login: self.login,
            store,
            publisher,
        }
    }
}
