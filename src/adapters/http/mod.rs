//! HTTP inbound adapter.
//!
//! Exposes a health probe on `/` and the split-and-upload job endpoint.
//! Each request runs one job to completion before responding.

pub mod handlers;

use crate::adapters::dropbox::DropboxStore;
use crate::adapters::fs::FsStore;
use crate::adapters::AnyStore;
use crate::application::pipeline::SplitUploadService;
use crate::config::{Backend, ServiceConfig};
use crate::ports::codec::CodecTool;
use crate::ports::source::SourceFetcher;
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use handlers::{ApiError, SPLIT_ROUTE};

pub struct AppState<C, F> {
    pub service: SplitUploadService<C, F>,
    /// Shared connection pool for per-request Dropbox clients.
    pub client: Client,
    pub config: ServiceConfig,
}

impl<C, F> AppState<C, F> {
    pub fn new(service: SplitUploadService<C, F>, client: Client, config: ServiceConfig) -> Self {
        Self {
            service,
            client,
            config,
        }
    }

    /// Destination store for one job, authenticated with the request token.
    pub fn store_for(&self, token: &str) -> AnyStore {
        match self.config.backend {
            Backend::Dropbox => AnyStore::Dropbox(
                DropboxStore::new(self.client.clone(), token)
                    .with_timeouts(self.config.list_timeout, self.config.upload_timeout),
            ),
            Backend::Local => AnyStore::Local(FsStore::new(self.config.local_store_dir.clone())),
        }
    }
}

pub fn router<C, F>(state: Arc<AppState<C, F>>) -> Router
where
    C: CodecTool + 'static,
    F: SourceFetcher + 'static,
{
    Router::new()
        .route("/", get(handlers::health))
        .route(SPLIT_ROUTE, post(handlers::split_audio_upload::<C, F>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
