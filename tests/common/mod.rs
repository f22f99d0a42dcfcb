//! Shared fixtures for router integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ad_video_relay::config::Config;
use ad_video_relay::extractor::{
    BrowserLauncher, BrowserSession, HttpVideoFetcher, LaunchOptions, PageHandle,
};
use ad_video_relay::web::{create_app, AppState};
use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;
use url::Url;

/// Browser stand-in whose pages expose a fixed list of video sources.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    sources: Vec<String>,
    goto_delay: Duration,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    visited: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FakeBrowser {
    pub fn with_sources(sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    /// Pages take `delay` to finish loading.
    pub fn with_goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = delay;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            closed: false,
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    closed: bool,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>> {
        Ok(Box::new(FakePage {
            browser: self.browser.clone(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.browser.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FakePage {
    browser: FakeBrowser,
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, url: &Url) -> Result<()> {
        self.browser.visited.lock().unwrap().push(url.to_string());
        tokio::time::sleep(self.browser.goto_delay).await;
        Ok(())
    }

    async fn sources(&self, _selector: &str) -> Result<Vec<String>> {
        Ok(self.browser.sources.clone())
    }

    async fn first_source(&self, _selector: &str) -> Result<Option<String>> {
        Ok(self.browser.sources.first().cloned())
    }
}

/// Router backed by the fake browser and a real HTTP downloader.
pub fn test_app(config: Config, browser: &FakeBrowser) -> Router {
    let fetcher = HttpVideoFetcher::new().expect("Failed to build fetcher");
    let state = AppState::new(config, Arc::new(browser.clone()), Arc::new(fetcher))
        .expect("Failed to build app state");
    create_app(state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
