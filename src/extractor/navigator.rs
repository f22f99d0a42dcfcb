//! Page navigation and media readiness.
//!
//! Navigation and the element wait are bounded separately and run one after
//! the other; neither budget is shared with the other.

use std::time::Duration;

use tracing::debug;
use url::Url;

use super::browser::PageHandle;
use super::error::ExtractError;
use crate::constants::VIDEO_WITH_SOURCE_SELECTOR;

/// Interval between DOM probes while waiting for video elements.
pub const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Navigate `page` to `url`, giving up after `timeout`.
pub async fn navigate(
    page: &dyn PageHandle,
    url: &Url,
    timeout: Duration,
) -> Result<(), ExtractError> {
    debug!(url = %url, timeout_ms = timeout.as_millis(), "Navigating");
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ExtractError::Browser(e)),
        Err(_) => Err(ExtractError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

/// Wait until at least one `video[src]` element with a usable source exists.
pub async fn wait_for_video_element(
    page: &dyn PageHandle,
    timeout: Duration,
) -> Result<(), ExtractError> {
    wait_for_sources(page, VIDEO_WITH_SOURCE_SELECTOR, timeout, ELEMENT_POLL_INTERVAL).await
}

async fn wait_for_sources(
    page: &dyn PageHandle,
    selector: &'static str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), ExtractError> {
    let probe = async {
        loop {
            match page.sources(selector).await {
                Ok(sources) if !sources.is_empty() => {
                    debug!(selector, count = sources.len(), "Video elements present");
                    return;
                }
                Ok(_) => {}
                // The page may still be swapping documents; keep probing until the deadline.
                Err(e) => debug!(selector, "DOM probe failed: {e:#}"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, probe)
        .await
        .map_err(|_| ExtractError::ElementTimeout { selector, timeout })
}
