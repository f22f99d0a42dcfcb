//! Candidate selection policies.
//!
//! All three policies share the same candidate list and differ only in which
//! candidate they download and what they accept:
//!
//! - [`SelectionPolicy::FirstUnderLimit`] walks candidates in DOM order and
//!   returns the first whose buffered body fits the size limit. Failed or
//!   oversized downloads are skipped.
//! - [`SelectionPolicy::UniformRandom`] streams one candidate picked uniformly
//!   at random. No size limit applies and a failed download is final.
//! - [`SelectionPolicy::SingleBest`] downloads the page's first video. No size
//!   limit applies and a failed download is final.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::{info, warn};

use super::candidates::CandidateVideo;
use super::error::ExtractError;
use super::fetch::{DownloadedAsset, FetchError, FetchOptions, VideoFetcher, VideoStream};
use crate::constants::BROWSER_USER_AGENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    FirstUnderLimit,
    UniformRandom,
    SingleBest,
}

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    /// Inclusive bound on the downloaded size. Only `FirstUnderLimit` uses it;
    /// `None` accepts any size.
    pub size_limit_bytes: Option<u64>,
    /// Per-candidate download budget for `FirstUnderLimit`.
    pub download_timeout: Duration,
}

/// Bytes of the chosen video, buffered or still streaming.
#[derive(Debug)]
pub enum Payload {
    Buffered(DownloadedAsset),
    Streamed(VideoStream),
}

impl Payload {
    /// Buffer the payload if it is still streaming.
    pub async fn into_asset(self) -> Result<DownloadedAsset, FetchError> {
        match self {
            Self::Buffered(asset) => Ok(asset),
            Self::Streamed(stream) => stream.buffer().await,
        }
    }
}

/// The candidate a policy settled on.
#[derive(Debug)]
pub struct SelectedVideo {
    pub candidate: CandidateVideo,
    pub payload: Payload,
}

/// Apply `policy` to `candidates`, downloading through `fetcher`.
pub async fn select(
    policy: SelectionPolicy,
    candidates: Vec<CandidateVideo>,
    fetcher: &dyn VideoFetcher,
    settings: &SelectionSettings,
    rng: &mut (dyn RngCore + Send),
) -> Result<SelectedVideo, ExtractError> {
    match policy {
        SelectionPolicy::FirstUnderLimit => first_under_limit(candidates, fetcher, settings).await,
        SelectionPolicy::UniformRandom => {
            let candidate = pick_uniform(&candidates, rng)
                .cloned()
                .ok_or(ExtractError::NoCandidates)?;
            uniform_random(candidate, fetcher).await
        }
        SelectionPolicy::SingleBest => single_best(candidates, fetcher).await,
    }
}

async fn first_under_limit(
    candidates: Vec<CandidateVideo>,
    fetcher: &dyn VideoFetcher,
    settings: &SelectionSettings,
) -> Result<SelectedVideo, ExtractError> {
    if candidates.is_empty() {
        return Err(ExtractError::NoCandidates);
    }

    let limit = settings.size_limit_bytes.unwrap_or(u64::MAX);
    let options = FetchOptions {
        timeout: Some(settings.download_timeout),
        user_agent: Some(BROWSER_USER_AGENT),
    };
    let attempted = candidates.len();

    for (index, candidate) in candidates.into_iter().enumerate() {
        match fetcher.fetch(&candidate.source_url, &options).await {
            Ok(asset) if asset.size_bytes <= limit => {
                info!(
                    url = %candidate.source_url,
                    index,
                    size = asset.size_bytes,
                    "Selected video under size limit"
                );
                return Ok(SelectedVideo {
                    candidate,
                    payload: Payload::Buffered(asset),
                });
            }
            Ok(asset) => {
                warn!(
                    url = %candidate.source_url,
                    index,
                    size = asset.size_bytes,
                    limit,
                    "Video exceeds size limit, trying next candidate"
                );
            }
            Err(e) => {
                warn!(
                    url = %candidate.source_url,
                    index,
                    "Video download failed, trying next candidate: {e}"
                );
            }
        }
    }

    Err(ExtractError::NoEligibleVideo {
        limit_bytes: limit,
        attempted,
    })
}

async fn uniform_random(
    candidate: CandidateVideo,
    fetcher: &dyn VideoFetcher,
) -> Result<SelectedVideo, ExtractError> {
    info!(url = %candidate.source_url, "Picked random video");
    let stream = fetcher
        .open_stream(&candidate.source_url, &FetchOptions::default())
        .await
        .map_err(|source| ExtractError::Download {
            url: candidate.source_url.to_string(),
            source,
        })?;
    Ok(SelectedVideo {
        candidate,
        payload: Payload::Streamed(stream),
    })
}

async fn single_best(
    candidates: Vec<CandidateVideo>,
    fetcher: &dyn VideoFetcher,
) -> Result<SelectedVideo, ExtractError> {
    let candidate = candidates
        .into_iter()
        .next()
        .ok_or(ExtractError::VideoNotFound)?;
    let asset = fetcher
        .fetch(&candidate.source_url, &FetchOptions::default())
        .await
        .map_err(|source| ExtractError::Download {
            url: candidate.source_url.to_string(),
            source,
        })?;
    Ok(SelectedVideo {
        candidate,
        payload: Payload::Buffered(asset),
    })
}

/// Uniform pick over the whole list.
pub fn pick_uniform<'a, R: Rng + ?Sized>(
    candidates: &'a [CandidateVideo],
    rng: &mut R,
) -> Option<&'a CandidateVideo> {
    candidates.choose(rng)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use url::Url;

    use super::*;

    const MB: u64 = 1024 * 1024;

    /// Serves fixed sizes per URL and records every request.
    #[derive(Default)]
    struct SizedFetcher {
        sizes: HashMap<String, u64>,
        failing: Vec<String>,
        calls: Mutex<Vec<(String, FetchOptions)>>,
    }

    impl SizedFetcher {
        fn with_sizes(entries: &[(&str, u64)]) -> Self {
            Self {
                sizes: entries
                    .iter()
                    .map(|(u, s)| ((*u).to_string(), *s))
                    .collect(),
                ..Self::default()
            }
        }

        fn failing(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| u.clone())
                .collect()
        }

        fn respond(&self, url: &Url, options: &FetchOptions) -> Result<Bytes, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));
            if self.failing.contains(&url.to_string()) {
                return Err(FetchError::Status(500));
            }
            let size = self.sizes.get(url.as_str()).copied().unwrap_or(0);
            Ok(Bytes::from(vec![1u8; size as usize]))
        }
    }

    #[async_trait]
    impl VideoFetcher for SizedFetcher {
        async fn fetch(
            &self,
            url: &Url,
            options: &FetchOptions,
        ) -> Result<DownloadedAsset, FetchError> {
            let bytes = self.respond(url, options)?;
            Ok(DownloadedAsset::new(bytes, "video/mp4"))
        }

        async fn open_stream(
            &self,
            url: &Url,
            options: &FetchOptions,
        ) -> Result<VideoStream, FetchError> {
            let bytes = self.respond(url, options)?;
            Ok(VideoStream {
                content_type: "video/mp4".to_string(),
                content_length: Some(bytes.len() as u64),
                body: futures_util::stream::iter(vec![Ok(bytes)]).boxed(),
            })
        }
    }

    fn candidates(urls: &[&str]) -> Vec<CandidateVideo> {
        urls.iter()
            .map(|u| CandidateVideo {
                source_url: Url::parse(u).unwrap(),
            })
            .collect()
    }

    fn settings() -> SelectionSettings {
        SelectionSettings {
            size_limit_bytes: Some(25 * MB),
            download_timeout: Duration::from_secs(20),
        }
    }

    const A: &str = "https://cdn.example.com/a.mp4";
    const B: &str = "https://cdn.example.com/b.mp4";
    const C: &str = "https://cdn.example.com/c.mp4";

    #[tokio::test]
    async fn test_first_under_limit_prefers_dom_order_over_size() {
        let fetcher = SizedFetcher::with_sizes(&[(A, 30 * MB), (B, 20 * MB), (C, 5 * MB)]);
        let mut rng = StdRng::seed_from_u64(1);

        let selected = select(
            SelectionPolicy::FirstUnderLimit,
            candidates(&[A, B, C]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap();

        assert_eq!(selected.candidate.source_url.as_str(), B);
        let Payload::Buffered(asset) = selected.payload else {
            panic!("expected buffered payload");
        };
        assert_eq!(asset.size_bytes, 20 * MB);
        assert_eq!(fetcher.requested(), vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test]
    async fn test_first_under_limit_sends_timeout_and_user_agent() {
        let fetcher = SizedFetcher::with_sizes(&[(A, MB)]);
        let mut rng = StdRng::seed_from_u64(1);

        select(
            SelectionPolicy::FirstUnderLimit,
            candidates(&[A]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap();

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls[0].1.timeout, Some(Duration::from_secs(20)));
        assert_eq!(calls[0].1.user_agent, Some(BROWSER_USER_AGENT));
    }

    #[tokio::test]
    async fn test_first_under_limit_accepts_exact_limit() {
        let fetcher = SizedFetcher::with_sizes(&[(A, 25 * MB)]);
        let mut rng = StdRng::seed_from_u64(1);

        let selected = select(
            SelectionPolicy::FirstUnderLimit,
            candidates(&[A]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.source_url.as_str(), A);
    }

    #[tokio::test]
    async fn test_first_under_limit_all_oversized_tries_each_once() {
        let fetcher = SizedFetcher::with_sizes(&[(A, 26 * MB), (B, 30 * MB), (C, 40 * MB)]);
        let mut rng = StdRng::seed_from_u64(1);

        let err = select(
            SelectionPolicy::FirstUnderLimit,
            candidates(&[A, B, C]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ExtractError::NoEligibleVideo { attempted: 3, .. }
        ));
        assert_eq!(
            fetcher.requested(),
            vec![A.to_string(), B.to_string(), C.to_string()]
        );
    }

    #[tokio::test]
    async fn test_first_under_limit_skips_failed_download() {
        let fetcher = SizedFetcher::with_sizes(&[(A, MB), (B, 2 * MB)]).failing(A);
        let mut rng = StdRng::seed_from_u64(1);

        let selected = select(
            SelectionPolicy::FirstUnderLimit,
            candidates(&[A, B]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.source_url.as_str(), B);
    }

    #[tokio::test]
    async fn test_empty_candidates_are_not_found() {
        let fetcher = SizedFetcher::default();
        let mut rng = StdRng::seed_from_u64(1);

        for policy in [
            SelectionPolicy::FirstUnderLimit,
            SelectionPolicy::UniformRandom,
        ] {
            let err = select(policy, Vec::new(), &fetcher, &settings(), &mut rng)
                .await
                .unwrap_err();
            assert!(err.is_not_found(), "{policy:?}");
        }
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn test_uniform_random_ignores_size_limit() {
        let fetcher = SizedFetcher::with_sizes(&[(A, 2 * MB)]);
        let mut rng = StdRng::seed_from_u64(7);
        let tight = SelectionSettings {
            size_limit_bytes: Some(MB),
            ..settings()
        };

        let selected = select(
            SelectionPolicy::UniformRandom,
            candidates(&[A]),
            &fetcher,
            &tight,
            &mut rng,
        )
        .await
        .unwrap();

        let asset = selected.payload.into_asset().await.unwrap();
        assert_eq!(asset.size_bytes, 2 * MB);
    }

    #[tokio::test]
    async fn test_uniform_random_failure_is_fatal() {
        let fetcher = SizedFetcher::with_sizes(&[(A, MB), (B, MB)])
            .failing(A)
            .failing(B);
        let mut rng = StdRng::seed_from_u64(7);

        let err = select(
            SelectionPolicy::UniformRandom,
            candidates(&[A, B]),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExtractError::Download { .. }));
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[test]
    fn test_pick_uniform_covers_every_candidate() {
        let list = candidates(&[A, B, C]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(pick_uniform(&list, &mut rng).unwrap().source_url.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_single_best_missing_source() {
        let fetcher = SizedFetcher::default();
        let mut rng = StdRng::seed_from_u64(1);

        let err = select(
            SelectionPolicy::SingleBest,
            Vec::new(),
            &fetcher,
            &settings(),
            &mut rng,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExtractError::VideoNotFound));
    }

    #[tokio::test]
    async fn test_single_best_has_no_size_bound() {
        let fetcher = SizedFetcher::with_sizes(&[(A, 3 * MB)]);
        let mut rng = StdRng::seed_from_u64(1);
        let tight = SelectionSettings {
            size_limit_bytes: Some(MB),
            ..settings()
        };

        let selected = select(
            SelectionPolicy::SingleBest,
            candidates(&[A]),
            &fetcher,
            &tight,
            &mut rng,
        )
        .await
        .unwrap();

        assert!(matches!(selected.payload, Payload::Buffered(ref a) if a.size_bytes == 3 * MB));
        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls[0].1.timeout, None);
    }
}
