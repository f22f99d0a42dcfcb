use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};
use url::Url;

pub mod browser;
pub mod candidates;
pub mod deliver;
pub mod error;
pub mod fetch;
pub mod navigator;
pub mod platform;
pub mod selection;

pub use browser::{
    BrowserLauncher, BrowserSession, ChromiumLauncher, LaunchOptions, PageHandle, SessionGuard,
};
pub use candidates::CandidateVideo;
pub use deliver::OutputMode;
pub use error::ExtractError;
pub use fetch::{HttpVideoFetcher, VideoFetcher};
pub use platform::AdPlatform;
pub use selection::{SelectionPolicy, SelectionSettings};

use crate::config::Config;

/// Headroom added to the navigation timeout for individual DevTools commands.
const CDP_REQUEST_MARGIN: Duration = Duration::from_secs(5);

/// One extraction run, fixed for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub target_url: Url,
    pub policy: SelectionPolicy,
    pub size_limit_bytes: Option<u64>,
    pub output_mode: OutputMode,
}

/// Pipeline stage of an extraction run.
///
/// Stages advance strictly in declaration order. A failure in any stage moves
/// the run straight to [`Stage::Closed`] after the browser is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Navigating,
    WaitingForMedia,
    Extracting,
    Selecting,
    Delivering,
    Closed,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::WaitingForMedia => "waiting_for_media",
            Self::Extracting => "extracting",
            Self::Selecting => "selecting",
            Self::Delivering => "delivering",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records stage transitions for one run.
#[derive(Debug)]
pub struct StageTracker {
    current: Stage,
}

impl StageTracker {
    pub const fn new() -> Self {
        Self {
            current: Stage::Idle,
        }
    }

    pub const fn current(&self) -> Stage {
        self.current
    }

    /// Move to `next`. Going backwards or leaving `Closed` is a logic error.
    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.current != Stage::Closed && next as u8 > self.current as u8,
            "invalid stage transition {} -> {}",
            self.current,
            next
        );
        debug!(from = %self.current, to = %next, "Extraction stage");
        self.current = next;
    }

    /// Close the run, returning the stage it was in.
    pub fn close(&mut self) -> Stage {
        let last = self.current;
        self.current = Stage::Closed;
        last
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeouts and browser options shared by every run.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub navigation_timeout: Duration,
    pub element_wait_timeout: Duration,
    pub download_timeout: Duration,
    pub launch: LaunchOptions,
}

impl ExtractorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout,
            element_wait_timeout: config.element_wait_timeout,
            download_timeout: config.download_timeout,
            launch: LaunchOptions {
                chrome_path: config.chrome_path.clone(),
                request_timeout: config.navigation_timeout + CDP_REQUEST_MARGIN,
                ..LaunchOptions::default()
            },
        }
    }
}

/// Runs the browser pipeline for a single ad page.
#[derive(Clone)]
pub struct VideoExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    fetcher: Arc<dyn VideoFetcher>,
    settings: Arc<ExtractorSettings>,
}

impl VideoExtractor {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        fetcher: Arc<dyn VideoFetcher>,
        settings: ExtractorSettings,
    ) -> Self {
        Self {
            launcher,
            fetcher,
            settings: Arc::new(settings),
        }
    }

    /// Extract a video from `request.target_url` and render it as a response.
    ///
    /// The browser is closed before this returns, whatever the outcome.
    pub async fn run(&self, request: &ExtractionRequest) -> Result<Response, ExtractError> {
        let mut stages = StageTracker::new();
        info!(
            url = %request.target_url,
            policy = ?request.policy,
            "Starting video extraction"
        );

        let mut guard =
            match SessionGuard::acquire(self.launcher.as_ref(), &self.settings.launch).await {
                Ok(guard) => guard,
                Err(e) => {
                    let stage = stages.close();
                    error!(url = %request.target_url, %stage, "Video extraction failed: {e}");
                    return Err(e);
                }
            };

        let outcome = self.drive(guard.session(), request, &mut stages).await;
        guard.release().await;
        let stage = stages.close();

        match &outcome {
            Ok(_) => info!(url = %request.target_url, "Video extraction finished"),
            Err(e) if e.is_not_found() => {
                info!(url = %request.target_url, %stage, "No usable video: {e}");
            }
            Err(e) => error!(url = %request.target_url, %stage, "Video extraction failed: {e}"),
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        request: &ExtractionRequest,
        stages: &mut StageTracker,
    ) -> Result<Response, ExtractError> {
        let page = session.new_page().await.map_err(ExtractError::Browser)?;

        stages.advance(Stage::Navigating);
        navigator::navigate(
            page.as_ref(),
            &request.target_url,
            self.settings.navigation_timeout,
        )
        .await?;

        stages.advance(Stage::WaitingForMedia);
        navigator::wait_for_video_element(page.as_ref(), self.settings.element_wait_timeout)
            .await?;

        stages.advance(Stage::Extracting);
        let found = match request.policy {
            SelectionPolicy::SingleBest => candidates::extract_single(page.as_ref())
                .await?
                .into_iter()
                .collect(),
            SelectionPolicy::FirstUnderLimit | SelectionPolicy::UniformRandom => {
                candidates::extract_candidates(page.as_ref()).await?
            }
        };

        stages.advance(Stage::Selecting);
        let settings = SelectionSettings {
            size_limit_bytes: request.size_limit_bytes,
            download_timeout: self.settings.download_timeout,
        };
        let mut rng = StdRng::from_entropy();
        let selected = selection::select(
            request.policy,
            found,
            self.fetcher.as_ref(),
            &settings,
            &mut rng,
        )
        .await?;

        stages.advance(Stage::Delivering);
        deliver::deliver(selected, &request.output_mode, &request.target_url).await
    }
}
