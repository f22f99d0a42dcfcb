use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::{DEFAULT_AD_LIBRARY_URLS, DEFAULT_USER_VIDEO_AD_URL};
use crate::webhooks::{WebhookKey, WebhookTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as URL: {source}")]
    ParseUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// Application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only through the web state.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Browser
    pub chrome_path: Option<String>,
    pub navigation_timeout: Duration,
    pub element_wait_timeout: Duration,

    // Downloads
    pub download_timeout: Duration,
    pub max_video_size_bytes: u64,

    // Ad sources
    pub user_video_ad_url: Url,
    pub random_ad_urls: Vec<Url>,
    pub user_video_delivery: UserVideoDelivery,

    // Brand defaults sent alongside the user video
    pub default_brand_url: String,
    pub default_contact_email: String,

    // Workflow engine
    pub webhooks: WebhookTable,
}

/// How `/api/get-user-video` hands the selected video back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVideoDelivery {
    /// `multipart/form-data` envelope with brand fields
    Multipart,
    /// Bare `video/mp4` attachment
    Attachment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 3000)?,

            // Browser
            chrome_path: optional_env("CHROME_PATH"),
            navigation_timeout: Duration::from_millis(parse_env_u64(
                "NAVIGATION_TIMEOUT_MS",
                60_000,
            )?),
            element_wait_timeout: Duration::from_millis(parse_env_u64(
                "ELEMENT_WAIT_TIMEOUT_MS",
                15_000,
            )?),

            // Downloads
            download_timeout: Duration::from_millis(parse_env_u64("DOWNLOAD_TIMEOUT_MS", 20_000)?),
            max_video_size_bytes: parse_env_u64("MAX_VIDEO_SIZE_BYTES", 25 * 1024 * 1024)?,

            // Ad sources
            user_video_ad_url: parse_url(
                "USER_VIDEO_AD_URL",
                &env_or_default("USER_VIDEO_AD_URL", DEFAULT_USER_VIDEO_AD_URL),
            )?,
            random_ad_urls: parse_url_list("RANDOM_AD_URLS")?,
            user_video_delivery: parse_delivery(&env_or_default("USER_VIDEO_DELIVERY", "multipart"))?,

            default_brand_url: env_or_default("DEFAULT_BRAND_URL", "https://thepetlabco.com/"),
            default_contact_email: env_or_default("DEFAULT_CONTACT_EMAIL", "contact@example.com"),

            webhooks: load_webhooks()?,
        })
    }

    /// Configuration with built-in defaults and no environment lookups.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            chrome_path: None,
            navigation_timeout: Duration::from_millis(60_000),
            element_wait_timeout: Duration::from_millis(15_000),
            download_timeout: Duration::from_millis(20_000),
            max_video_size_bytes: 25 * 1024 * 1024,
            user_video_ad_url: Url::parse(DEFAULT_USER_VIDEO_AD_URL)
                .expect("built-in ad URL is valid"),
            random_ad_urls: DEFAULT_AD_LIBRARY_URLS
                .iter()
                .map(|u| Url::parse(u).expect("built-in ad URL is valid"))
                .collect(),
            user_video_delivery: UserVideoDelivery::Multipart,
            default_brand_url: "https://thepetlabco.com/".to_string(),
            default_contact_email: "contact@example.com".to_string(),
            webhooks: WebhookTable::default(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("NAVIGATION_TIMEOUT_MS", self.navigation_timeout),
            ("ELEMENT_WAIT_TIMEOUT_MS", self.element_wait_timeout),
            ("DOWNLOAD_TIMEOUT_MS", self.download_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_video_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_VIDEO_SIZE_BYTES".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.random_ad_urls.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "RANDOM_AD_URLS".to_string(),
                message: "must contain at least one URL".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::ParseUrl {
        name: name.to_string(),
        source: e,
    })
}

fn parse_url_list(name: &str) -> Result<Vec<Url>, ConfigError> {
    match optional_env(name) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_url(name, s))
            .collect(),
        None => DEFAULT_AD_LIBRARY_URLS
            .iter()
            .map(|s| parse_url(name, s))
            .collect(),
    }
}

fn parse_delivery(value: &str) -> Result<UserVideoDelivery, ConfigError> {
    match value.to_lowercase().as_str() {
        "multipart" | "form" => Ok(UserVideoDelivery::Multipart),
        "attachment" | "raw" => Ok(UserVideoDelivery::Attachment),
        _ => Err(ConfigError::InvalidValue {
            name: "USER_VIDEO_DELIVERY".to_string(),
            message: format!("expected 'multipart' or 'attachment', got '{value}'"),
        }),
    }
}

fn load_webhooks() -> Result<WebhookTable, ConfigError> {
    let mut table = WebhookTable::default();
    for key in WebhookKey::ALL {
        let name = key.env_var();
        if let Some(raw) = optional_env(&name) {
            let url = parse_url(&name, &raw)?;
            table.set(key, url);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delivery() {
        assert_eq!(
            parse_delivery("multipart").unwrap(),
            UserVideoDelivery::Multipart
        );
        assert_eq!(
            parse_delivery("ATTACHMENT").unwrap(),
            UserVideoDelivery::Attachment
        );
        assert!(parse_delivery("zip").is_err());
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = Config::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.random_ad_urls.len(), DEFAULT_AD_LIBRARY_URLS.len());
        assert_eq!(config.max_video_size_bytes, 26_214_400);
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = Config {
            max_video_size_bytes: 0,
            ..Config::for_testing()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MAX_VIDEO_SIZE_BYTES"));
    }

    #[test]
    fn test_validate_rejects_empty_url_list() {
        let config = Config {
            random_ad_urls: Vec::new(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_url_list_from_env() {
        std::env::set_var(
            "RANDOM_AD_URLS",
            "https://www.facebook.com/ads/library/?id=1, https://www.facebook.com/ads/library/?id=2",
        );
        let urls = parse_url_list("RANDOM_AD_URLS").unwrap();
        std::env::remove_var("RANDOM_AD_URLS");

        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].query(), Some("id=2"));
    }

    #[test]
    #[serial_test::serial]
    fn test_webhook_override_from_env() {
        std::env::set_var("N8N_WEBHOOK_HOOK_RECREATOR", "http://localhost:5678/webhook/hook");
        let table = load_webhooks().unwrap();
        std::env::remove_var("N8N_WEBHOOK_HOOK_RECREATOR");

        assert_eq!(
            table.url(WebhookKey::HookRecreator).unwrap().as_str(),
            "http://localhost:5678/webhook/hook"
        );
    }
}
