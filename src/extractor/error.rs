use std::time::Duration;

use thiserror::Error;

use super::fetch::FetchError;

const MIB: u64 = 1024 * 1024;

/// Failures of one extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch browser: {0}")]
    Launch(#[source] anyhow::Error),

    #[error("browser error: {0}")]
    Browser(#[source] anyhow::Error),

    #[error("navigation to {url} timed out after {}ms", .timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("timed out after {}ms waiting for selector '{selector}'", .timeout.as_millis())]
    ElementTimeout {
        selector: &'static str,
        timeout: Duration,
    },

    #[error("no videos found on the page")]
    NoCandidates,

    #[error("no video under {}MB found ({attempted} tried)", .limit_bytes / MIB)]
    NoEligibleVideo { limit_bytes: u64, attempted: usize },

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("video URL not found")]
    VideoNotFound,
}

impl ExtractError {
    /// Whether the page loaded but had nothing acceptable to return.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoCandidates | Self::NoEligibleVideo { .. })
    }
}
