//! Headless browser sessions.
//!
//! Every extraction run gets its own browser process. The process is owned by
//! a [`SessionGuard`]; the guard is released explicitly at the end of a run, and
//! dropping an unreleased guard (a cancelled request) kills the process.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::error::ExtractError;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 800;

/// How long to wait for the browser process to exit after close or kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Upper bound for a single DevTools command.
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>>;
}

/// One running browser process.
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>>;

    /// Shut the browser down. Calling this more than once is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// A tab inside a [`BrowserSession`].
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate to `url` and wait for the load to settle.
    async fn goto(&self, url: &Url) -> Result<()>;

    /// Non-empty `src` values of every element matching `selector`, in DOM order.
    async fn sources(&self, selector: &str) -> Result<Vec<String>>;

    /// `src` of the first element matching `selector`, if it has one.
    async fn first_source(&self, selector: &str) -> Result<Option<String>>;
}

/// Scoped ownership of a browser session.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    released: bool,
}

impl SessionGuard {
    /// Launch a browser for one extraction run.
    pub async fn acquire(
        launcher: &dyn BrowserLauncher,
        options: &LaunchOptions,
    ) -> Result<Self, ExtractError> {
        let session = launcher
            .launch(options)
            .await
            .map_err(ExtractError::Launch)?;
        Ok(Self {
            session,
            released: false,
        })
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }

    /// Close the browser. Errors are logged, never propagated, so that the
    /// outcome of the run is what reaches the caller.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.session.close().await {
            warn!("Failed to close browser: {e:#}");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!("Browser session dropped before release; process will be killed");
        }
    }
}

/// [`BrowserLauncher`] that starts headless Chrome/Chromium via `chromiumoxide`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        debug!("Launching headless browser");

        let mut config_builder = BrowserConfig::builder()
            .window_size(options.viewport_width, options.viewport_height)
            .request_timeout(options.request_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg("--autoplay-policy=no-user-gesture-required");

        if let Some(ref chrome_path) = options.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        info!("Headless browser launched");

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            closed: false,
        }))
    }
}

/// Wait for `exit` for at most `timeout`. Returns whether the process was reaped.
async fn reap_within<F, T, E>(exit: F, timeout: Duration) -> bool
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, exit).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Failed to reap browser process: {e}");
            true
        }
        Err(_) => false,
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let closed = self.browser.close().await;
        if closed.is_err() {
            warn!("Browser did not close cleanly, killing process");
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("Failed to kill browser process: {e}");
            }
        }
        if !reap_within(self.browser.wait(), REAP_TIMEOUT).await {
            warn!(
                timeout_ms = REAP_TIMEOUT.as_millis(),
                "Browser process did not exit in time"
            );
        }
        self.handler_task.abort();

        closed.context("Failed to close browser")?;
        debug!("Browser closed");
        Ok(())
    }
}

struct ChromiumPage {
    page: chromiumoxide::Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&self, url: &Url) -> Result<()> {
        self.page
            .goto(url.as_str())
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn sources(&self, selector: &str) -> Result<Vec<String>> {
        let script = format!(
            "Array.from(document.querySelectorAll({})).map(el => el.src).filter(Boolean)",
            serde_json::to_string(selector)?
        );
        self.page
            .evaluate(script)
            .await
            .context("Failed to query video sources")?
            .into_value()
            .context("Unexpected video source list")
    }

    async fn first_source(&self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el && el.src ? el.src : null; }})()",
            serde_json::to_string(selector)?
        );
        self.page
            .evaluate(script)
            .await
            .context("Failed to query video source")?
            .into_value()
            .context("Unexpected video source")
    }
}
