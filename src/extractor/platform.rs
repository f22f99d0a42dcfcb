use std::fmt;

use regex::Regex;
use serde::Serialize;

static META_PATTERN: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"facebook\.com/ads/library").unwrap());

static TIKTOK_PATTERN: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"tiktok\.com/ads/detail").unwrap());

/// Ad library an ad URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdPlatform {
    Meta,
    Tiktok,
}

impl AdPlatform {
    /// Classify an ad URL by the library page it points at.
    ///
    /// Returns `None` for anything that is neither a Meta Ads Library page
    /// nor a TikTok ad detail page.
    #[must_use]
    pub fn classify(url: &str) -> Option<Self> {
        if TIKTOK_PATTERN.is_match(url) {
            Some(Self::Tiktok)
        } else if META_PATTERN.is_match(url) {
            Some(Self::Meta)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for AdPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
