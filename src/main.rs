//! Splitdrop binary - HTTP service wiring.
//!
//! Wires up:
//! - ffmpeg/ffprobe CLI codec adapter
//! - HTTP source fetcher
//! - Dropbox (or local directory) destination, built per request
//! - HTTP inbound adapter

use reqwest::Client;
use splitdrop::adapters::fetch::HttpFetcher;
use splitdrop::adapters::ffmpeg::FfmpegCli;
use splitdrop::adapters::http::{router, AppState};
use splitdrop::application::{PipelineSettings, SplitUploadService};
use splitdrop::config::ServiceConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Adapters
    let client = Client::builder()
        .build()
        .expect("Failed to build HTTP client");
    let codec = FfmpegCli::new(&config.ffmpeg_bin, &config.ffprobe_bin);
    let fetcher = HttpFetcher::new(client.clone(), config.fetch_timeout);

    // 2. Application service
    let settings = PipelineSettings {
        scratch_root: config.scratch_dir.clone(),
        max_segments: config.max_segments,
        upload_pause: config.upload_pause,
    };
    let service = SplitUploadService::new(codec, fetcher, settings);

    // 3. HTTP layer
    let address = config.bind_address();
    info!(
        "Destination backend {:?}, scratch in {:?}, at most {} segments per job",
        config.backend, config.scratch_dir, config.max_segments
    );
    let app = router(Arc::new(AppState::new(service, client, config)));

    // 4. Start server
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("Failed to bind TCP listener");
    info!("Listening at {}", address);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
