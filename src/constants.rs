//! Shared constants used across the application.

/// User agent string sent when downloading candidate videos.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// CSS selector for video elements that already carry a source.
pub const VIDEO_WITH_SOURCE_SELECTOR: &str = "video[src]";

/// MIME type used when the upstream does not report a video content type.
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Ads-library page used by `/api/get-user-video` unless overridden.
pub const DEFAULT_USER_VIDEO_AD_URL: &str = "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=177930899801067";

/// Ads-library pages sampled by `/api/random-meta-video` unless overridden.
pub const DEFAULT_AD_LIBRARY_URLS: [&str; 6] = [
    // PetLabCo
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=177930899801067",
    // Javvy
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=109899597504831",
    // Hike
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=275270825974823",
    // HiSmile
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=1573441899601646",
    // David Protein
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=357167600818818",
    // HeyShape
    "https://www.facebook.com/ads/library/?active_status=active&ad_type=all&country=US&is_targeted_country=false&media_type=video&search_type=page&view_all_page_id=108815292124532",
];
