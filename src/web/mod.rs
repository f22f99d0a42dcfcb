mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

use crate::config::Config;
use crate::extractor::{
    BrowserLauncher, ChromiumLauncher, ExtractorSettings, HttpVideoFetcher, VideoExtractor,
    VideoFetcher,
};
use crate::webhooks::WebhookRelay;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extractor: VideoExtractor,
    pub relay: WebhookRelay,
}

impl AppState {
    /// Wire the extractor and webhook relay for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook HTTP client cannot be built.
    pub fn new(
        config: Config,
        launcher: Arc<dyn BrowserLauncher>,
        fetcher: Arc<dyn VideoFetcher>,
    ) -> Result<Self> {
        let extractor =
            VideoExtractor::new(launcher, fetcher, ExtractorSettings::from_config(&config));
        let relay = WebhookRelay::new(config.webhooks.clone())
            .context("Failed to create webhook client")?;
        Ok(Self {
            config: Arc::new(config),
            extractor,
            relay,
        })
    }
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let fetcher = HttpVideoFetcher::new().context("Failed to create download client")?;
    let state = AppState::new(config, Arc::new(ChromiumLauncher), Arc::new(fetcher))?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .fallback(routes::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
