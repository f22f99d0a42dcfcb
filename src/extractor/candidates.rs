use tracing::debug;
use url::Url;

use super::browser::PageHandle;
use super::error::ExtractError;
use crate::constants::VIDEO_WITH_SOURCE_SELECTOR;

/// A video source found on the page, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVideo {
    pub source_url: Url,
}

/// Every `video[src]` source on the page, in DOM order.
///
/// An empty list is a normal outcome; only a failure to talk to the page is
/// an error.
pub async fn extract_candidates(page: &dyn PageHandle) -> Result<Vec<CandidateVideo>, ExtractError> {
    let raw = page
        .sources(VIDEO_WITH_SOURCE_SELECTOR)
        .await
        .map_err(ExtractError::Browser)?;
    let candidates = to_candidates(raw);
    debug!(count = candidates.len(), "Extracted video candidates");
    Ok(candidates)
}

/// Source of the first `video` element on the page.
pub async fn extract_single(page: &dyn PageHandle) -> Result<Option<CandidateVideo>, ExtractError> {
    let raw = page
        .first_source("video")
        .await
        .map_err(ExtractError::Browser)?;
    Ok(raw.and_then(|src| to_candidates(vec![src]).pop()))
}

fn to_candidates(raw: Vec<String>) -> Vec<CandidateVideo> {
    raw.into_iter()
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .filter_map(|src| match Url::parse(&src) {
            Ok(source_url) => Some(CandidateVideo { source_url }),
            Err(e) => {
                debug!(src = %src, "Skipping unparseable video source: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_dom_order() {
        let candidates = to_candidates(vec![
            "https://cdn.example.com/3.mp4".to_string(),
            "https://cdn.example.com/1.mp4".to_string(),
            "https://cdn.example.com/2.mp4".to_string(),
        ]);
        let paths: Vec<&str> = candidates.iter().map(|c| c.source_url.path()).collect();
        assert_eq!(paths, vec!["/3.mp4", "/1.mp4", "/2.mp4"]);
    }

    #[test]
    fn test_drops_empty_and_invalid_sources() {
        let candidates = to_candidates(vec![
            String::new(),
            "   ".to_string(),
            "not a url".to_string(),
            "https://cdn.example.com/ok.mp4".to_string(),
        ]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_url.path(), "/ok.mp4");
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(to_candidates(Vec::new()).is_empty());
    }
}
