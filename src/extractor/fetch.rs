//! HTTP download of candidate videos.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::constants::DEFAULT_VIDEO_MIME;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A fully buffered download.
#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub bytes: Bytes,
    pub content_type: String,
    pub size_bytes: u64,
}

impl DownloadedAsset {
    #[must_use]
    pub fn new(bytes: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            size_bytes: bytes.len() as u64,
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// A download whose body is still on the wire.
pub struct VideoStream {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl VideoStream {
    /// Drain the stream into memory.
    pub async fn buffer(self) -> Result<DownloadedAsset, FetchError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(DownloadedAsset::new(
            Bytes::from(chunks.concat()),
            self.content_type,
        ))
    }
}

impl std::fmt::Debug for VideoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Per-request download settings.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Bound on the whole request, body included.
    pub timeout: Option<Duration>,
    pub user_agent: Option<&'static str>,
}

/// Capability to download a video URL.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download the whole body into memory.
    async fn fetch(&self, url: &Url, options: &FetchOptions)
        -> Result<DownloadedAsset, FetchError>;

    /// Start a download and hand back the body as a stream.
    async fn open_stream(&self, url: &Url, options: &FetchOptions)
        -> Result<VideoStream, FetchError>;
}

/// [`VideoFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpVideoFetcher {
    client: Client,
}

impl HttpVideoFetcher {
    /// Create a fetcher with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &Url, options: &FetchOptions) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(agent) = options.user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, options.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl VideoFetcher for HttpVideoFetcher {
    async fn fetch(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<DownloadedAsset, FetchError> {
        let response = self.send(url, options).await?;
        let content_type = content_type_of(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(e, options.timeout))?;

        debug!(url = %url, size = bytes.len(), "Downloaded video");
        Ok(DownloadedAsset::new(bytes, content_type))
    }

    async fn open_stream(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<VideoStream, FetchError> {
        let response = self.send(url, options).await?;
        let content_type = content_type_of(&response);
        let content_length = response.content_length();
        let timeout = options.timeout;

        debug!(url = %url, content_length = ?content_length, "Streaming video");
        Ok(VideoStream {
            content_type,
            content_length,
            body: response
                .bytes_stream()
                .map_err(move |e| classify(e, timeout))
                .boxed(),
        })
    }
}

fn classify(err: reqwest::Error, timeout: Option<Duration>) -> FetchError {
    match timeout {
        Some(limit) if err.is_timeout() => FetchError::Timeout(limit),
        _ => FetchError::Http(err),
    }
}

fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VIDEO_MIME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_sends_user_agent_and_buffers_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .and(header("user-agent", "test-agent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![7u8; 1024], "video/mp4"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpVideoFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/v.mp4", server.uri())).unwrap();
        let options = FetchOptions {
            timeout: Some(Duration::from_secs(5)),
            user_agent: Some("test-agent"),
        };

        let asset = fetcher.fetch(&url, &options).await.unwrap();
        assert_eq!(asset.size_bytes, 1024);
        assert_eq!(asset.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = HttpVideoFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/blocked.mp4", server.uri())).unwrap();

        let err = fetcher
            .fetch(&url, &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(403)));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 16])
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpVideoFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/slow.mp4", server.uri())).unwrap();
        let options = FetchOptions {
            timeout: Some(Duration::from_millis(50)),
            user_agent: None,
        };

        let err = fetcher.fetch(&url, &options).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_stream_buffers_to_same_bytes() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let fetcher = HttpVideoFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/s.mp4", server.uri())).unwrap();

        let stream = fetcher
            .open_stream(&url, &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(stream.content_length, Some(10_000));

        let asset = stream.buffer().await.unwrap();
        assert_eq!(asset.bytes.as_ref(), body.as_slice());
    }
}
