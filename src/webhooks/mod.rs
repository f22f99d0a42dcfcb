//! Relay to the workflow engine's fixed webhook endpoints.
//!
//! The relay does no work of its own: it forwards an inbound payload to one
//! entry of a static webhook table and hands back whatever the engine replied.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(120);

/// Named workflow-engine webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKey {
    FacebookAdsRecreator,
    HandleCreateBrief,
    GenerateBrief,
    CrossPlatformMetaToTiktok,
    CrossPlatformTiktokToMeta,
    HookRecreator,
    LanguageTranslation,
    TiktokAdsRecreator,
    UploadMediaModal,
    ConcatDescriptions,
    GenerateDescriptions,
}

impl WebhookKey {
    pub const ALL: [Self; 11] = [
        Self::FacebookAdsRecreator,
        Self::HandleCreateBrief,
        Self::GenerateBrief,
        Self::CrossPlatformMetaToTiktok,
        Self::CrossPlatformTiktokToMeta,
        Self::HookRecreator,
        Self::LanguageTranslation,
        Self::TiktokAdsRecreator,
        Self::UploadMediaModal,
        Self::ConcatDescriptions,
        Self::GenerateDescriptions,
    ];

    /// Kebab-case name used in relay routes.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::FacebookAdsRecreator => "facebook-ads-recreator",
            Self::HandleCreateBrief => "handle-create-brief",
            Self::GenerateBrief => "generate-brief",
            Self::CrossPlatformMetaToTiktok => "cross-platform-meta-to-tiktok",
            Self::CrossPlatformTiktokToMeta => "cross-platform-tiktok-to-meta",
            Self::HookRecreator => "hook-recreator",
            Self::LanguageTranslation => "language-translation",
            Self::TiktokAdsRecreator => "tiktok-ads-recreator",
            Self::UploadMediaModal => "upload-media-modal",
            Self::ConcatDescriptions => "concat-descriptions",
            Self::GenerateDescriptions => "generate-descriptions",
        }
    }

    /// Environment variable that overrides this webhook's URL.
    #[must_use]
    pub fn env_var(self) -> String {
        format!(
            "N8N_WEBHOOK_{}",
            self.slug().replace('-', "_").to_uppercase()
        )
    }

    const fn default_url(self) -> &'static str {
        match self {
            Self::FacebookAdsRecreator => {
                "https://pdog.app.n8n.cloud/webhook/c77f11e4-8111-44e9-af8c-704741c75a47"
            }
            Self::HandleCreateBrief => {
                "https://pdog.app.n8n.cloud/webhook/e8ac4753-bfb2-424e-b80f-4bca195fb79e"
            }
            Self::GenerateBrief => {
                "https://pdog.app.n8n.cloud/webhook/09442549-54ca-4815-a2a4-fbdb684ee8ab"
            }
            Self::CrossPlatformMetaToTiktok => {
                "https://pdog.app.n8n.cloud/webhook/1d9f5cb6-7d6f-4919-90dd-aec406c6a24e"
            }
            Self::CrossPlatformTiktokToMeta => {
                "https://pdog.app.n8n.cloud/webhook/f54b1f26-a7ff-4509-8f2d-621c72a0a007"
            }
            Self::HookRecreator => {
                "https://pdog.app.n8n.cloud/webhook/61391805-edbc-4f68-98ae-5d127977bae4"
            }
            Self::LanguageTranslation => {
                "https://pdog.app.n8n.cloud/webhook/ff839c4a-f848-4e3b-94a9-1b6679cf12ff"
            }
            Self::TiktokAdsRecreator => {
                "https://pdog.app.n8n.cloud/webhook/c7eb5200-e47b-48b8-af1d-0c1e81bec831"
            }
            Self::UploadMediaModal => {
                "https://pdog.app.n8n.cloud/webhook/5abf52a2-e668-4644-9b79-d93dc9930fd7"
            }
            Self::ConcatDescriptions => {
                "https://pdog.app.n8n.cloud/webhook/6a9d6caa-e378-4f5b-a806-3e022f3adc3a"
            }
            Self::GenerateDescriptions => {
                "https://pdog.app.n8n.cloud/webhook/19bbb7d3-3739-4421-bc18-c318e4b2e389"
            }
        }
    }
}

impl fmt::Display for WebhookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for WebhookKey {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| RelayError::UnknownWebhook(s.to_string()))
    }
}

/// Immutable mapping from webhook name to endpoint.
#[derive(Debug, Clone)]
pub struct WebhookTable {
    urls: HashMap<WebhookKey, Url>,
}

impl WebhookTable {
    /// Replace the URL for one webhook.
    pub fn set(&mut self, key: WebhookKey, url: Url) {
        self.urls.insert(key, url);
    }

    #[must_use]
    pub fn url(&self, key: WebhookKey) -> Option<&Url> {
        self.urls.get(&key)
    }
}

impl Default for WebhookTable {
    fn default() -> Self {
        let urls = WebhookKey::ALL
            .into_iter()
            .filter_map(|k| Url::parse(k.default_url()).ok().map(|u| (k, u)))
            .collect();
        Self { urls }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("webhook '{0}' not found in configuration")]
    UnknownWebhook(String),
    #[error("unable to connect to webhook {webhook}: {source}")]
    Unreachable {
        webhook: WebhookKey,
        #[source]
        source: reqwest::Error,
    },
    #[error("webhook {webhook} request failed: {source}")]
    Request {
        webhook: WebhookKey,
        #[source]
        source: reqwest::Error,
    },
    #[error("webhook {webhook} failed: {status}")]
    Upstream {
        webhook: WebhookKey,
        status: u16,
        body: String,
    },
}

/// HTTP client that forwards payloads to configured webhooks.
#[derive(Clone)]
pub struct WebhookRelay {
    client: Client,
    table: Arc<WebhookTable>,
}

impl WebhookRelay {
    /// Create a relay over the given table.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(table: WebhookTable) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            table: Arc::new(table),
        })
    }

    /// Forward string fields as a `multipart/form-data` body.
    pub async fn forward_form(
        &self,
        key: WebhookKey,
        fields: Vec<(&'static str, String)>,
    ) -> Result<Value, RelayError> {
        let url = self.endpoint(key)?;
        let form = fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        self.send(key, self.client.post(url.clone()).multipart(form))
            .await
    }

    /// Forward a JSON payload unchanged.
    pub async fn forward_json(&self, key: WebhookKey, payload: &Value) -> Result<Value, RelayError> {
        let url = self.endpoint(key)?;
        self.send(key, self.client.post(url.clone()).json(payload))
            .await
    }

    fn endpoint(&self, key: WebhookKey) -> Result<&Url, RelayError> {
        self.table
            .url(key)
            .ok_or_else(|| RelayError::UnknownWebhook(key.slug().to_string()))
    }

    async fn send(&self, key: WebhookKey, request: RequestBuilder) -> Result<Value, RelayError> {
        debug!(webhook = %key, "Forwarding payload to webhook");

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                RelayError::Unreachable {
                    webhook: key,
                    source: e,
                }
            } else {
                RelayError::Request {
                    webhook: key,
                    source: e,
                }
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Request {
                webhook: key,
                source: e,
            })?;

        if !status.is_success() {
            error!(webhook = %key, status = status.as_u16(), body = %body, "Webhook returned error status");
            return Err(RelayError::Upstream {
                webhook: key,
                status: status.as_u16(),
                body,
            });
        }

        info!(webhook = %key, status = status.as_u16(), "Webhook call succeeded");
        Ok(parse_reply(&body))
    }
}

/// Workflow engines reply with JSON, plain text, or nothing at all.
fn parse_reply(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
