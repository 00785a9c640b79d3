//! Core traits for PostNL tracking
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ShipmentsApi`], [`TrackAndTraceApi`], [`LoginApi`]: remote PostNL APIs
//! - [`OAuth2Implementation`]: OAuth2 token refresh grant
//! - [`TokenStore`]: persisted config entry data (token and options)
//! - [`Poller`]: periodic refresh capability driven by the update engine
//! - [`StatePublisher`]: receives sensor state snapshots

pub mod api;
pub mod publisher;
pub mod token_store;

pub use api::{LoginApi, OAuth2Implementation, ShipmentsApi, TrackAndTraceApi};
pub use publisher::{Poller, StatePublisher};
pub use token_store::{StoredEntry, TokenStore, TokenStoreFactory};
