//! bucketdav library -- a WebDAV file server over a key-prefix object store.
//!
//! Paths map one-to-one onto object keys; directories are inferred from key
//! prefixes or made explicit with an empty `.dir` marker object.  This crate
//! provides the request handling, authentication, XML rendering, and the
//! pluggable object store backends.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod dav;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod xml;

use crate::config::Config;
use crate::storage::backend::ObjectStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The object store every path resolves against.
    pub store: Arc<dyn ObjectStore>,
}
