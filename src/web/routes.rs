use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use super::error::ApiError;
use super::AppState;
use crate::config::UserVideoDelivery;
use crate::extractor::{AdPlatform, ExtractionRequest, OutputMode, SelectionPolicy};
use crate::webhooks::WebhookKey;

const USER_VIDEO_FILE_NAME: &str = "user-meta-video.mp4";
const RANDOM_VIDEO_FILE_NAME: &str = "random-meta-video.mp4";
const AD_VIDEO_FILE_NAME: &str = "ad-video.mp4";

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/get-user-video", get(get_user_video))
        .route("/api/get-brand-url", get(get_brand_url))
        .route("/api/random-meta-video", get(random_meta_video))
        .route("/api/get-video", post(get_video))
        .route(
            "/api/n8n/facebook-ads-recreator",
            post(facebook_ads_recreator),
        )
        .route("/api/n8n/relay/:webhook", post(relay_webhook))
        .route("/api/n8n/health", get(n8n_health))
}

async fn health() -> &'static str {
    "OK"
}

// ========== Video Routes ==========

async fn get_user_video(State(state): State<AppState>) -> Response {
    let config = &state.config;
    let output_mode = match config.user_video_delivery {
        UserVideoDelivery::Multipart => OutputMode::MultipartForm {
            file_name: USER_VIDEO_FILE_NAME.to_string(),
            fields: vec![
                ("brandUrl".to_string(), config.default_brand_url.clone()),
                ("email".to_string(), config.default_contact_email.clone()),
            ],
        },
        UserVideoDelivery::Attachment => OutputMode::RawAttachment {
            file_name: USER_VIDEO_FILE_NAME.to_string(),
        },
    };

    let request = ExtractionRequest {
        target_url: config.user_video_ad_url.clone(),
        policy: SelectionPolicy::FirstUnderLimit,
        size_limit_bytes: Some(config.max_video_size_bytes),
        output_mode,
    };

    match state.extractor.run(&request).await {
        Ok(response) => response,
        Err(e) => ApiError::extraction("Error extracting video", &e).into_response(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrandInfo {
    brand_url: String,
    email: String,
}

async fn get_brand_url(State(state): State<AppState>) -> Json<BrandInfo> {
    Json(BrandInfo {
        brand_url: state.config.default_brand_url.clone(),
        email: state.config.default_contact_email.clone(),
    })
}

async fn random_meta_video(State(state): State<AppState>) -> Response {
    let chosen = {
        let mut rng = rand::thread_rng();
        state.config.random_ad_urls.choose(&mut rng).cloned()
    };
    let Some(target_url) = chosen else {
        return ApiError::internal("Failed to extract video")
            .with_details("no ad library pages configured")
            .into_response();
    };
    info!(url = %target_url, "Chose random ad library page");

    let request = ExtractionRequest {
        target_url,
        policy: SelectionPolicy::UniformRandom,
        size_limit_bytes: None,
        output_mode: OutputMode::RawAttachment {
            file_name: RANDOM_VIDEO_FILE_NAME.to_string(),
        },
    };

    match state.extractor.run(&request).await {
        Ok(response) => response,
        Err(e) => ApiError::extraction("Failed to extract video", &e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetVideoBody {
    ad_url: Option<String>,
}

async fn get_video(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Result<Json<GetVideoBody>, JsonRejection>,
) -> Response {
    let ad_url = body.ok().and_then(|Json(b)| b.ad_url).unwrap_or_default();
    let Some((platform, target_url)) = parse_ad_url(&ad_url) else {
        warn!(ad_url = %ad_url, "Rejected ad URL");
        return ApiError::bad_request("Invalid ad URL (must be Meta or TikTok)").into_response();
    };
    info!(platform = %platform, url = %target_url, "Fetching ad video");

    let params = query.map(|Query(pairs)| pairs).unwrap_or_default();
    let output_mode = if wants_download(&params) {
        OutputMode::RawAttachment {
            file_name: AD_VIDEO_FILE_NAME.to_string(),
        }
    } else {
        OutputMode::Base64Json
    };

    let request = ExtractionRequest {
        target_url,
        policy: SelectionPolicy::SingleBest,
        size_limit_bytes: None,
        output_mode,
    };

    match state.extractor.run(&request).await {
        Ok(response) => response,
        Err(e) => ApiError::extraction("Failed to extract video", &e).into_response(),
    }
}

/// Accept only Meta Ads Library and TikTok ad detail URLs.
fn parse_ad_url(raw: &str) -> Option<(AdPlatform, Url)> {
    let platform = AdPlatform::classify(raw)?;
    let url = Url::parse(raw.trim()).ok()?;
    Some((platform, url))
}

/// `download` must appear exactly once with the value `true`.
fn wants_download(params: &[(String, String)]) -> bool {
    let mut values = params
        .iter()
        .filter(|(key, _)| key == "download")
        .map(|(_, value)| value.as_str());
    matches!((values.next(), values.next()), (Some("true"), None))
}

// ========== Webhook Routes ==========

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdsRecreatorBody {
    video: Option<String>,
    brand_url: Option<String>,
    email: Option<String>,
    meta_link: Option<String>,
}

async fn facebook_ads_recreator(
    State(state): State<AppState>,
    body: Result<Json<AdsRecreatorBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let video = required_field("video", body.video)?;
    let brand_url = required_field("brandUrl", body.brand_url)?;
    let email = required_field("email", body.email)?;
    let meta_link = body
        .meta_link
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "uploaded".to_string());

    info!(brand_url = %brand_url, email = %email, meta_link = %meta_link, "Forwarding ads recreation request");

    let data = state
        .relay
        .forward_form(
            WebhookKey::FacebookAdsRecreator,
            vec![
                ("video", video),
                ("brandUrl", brand_url),
                ("email", email),
                ("metaLink", meta_link),
            ],
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Facebook ads recreation request sent successfully",
        "data": data,
    })))
}

fn required_field(name: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing required field: {name}")))
}

async fn relay_webhook(
    State(state): State<AppState>,
    Path(webhook): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let key: WebhookKey = webhook.parse()?;
    let payload = body
        .map_err(|e| ApiError::bad_request("Invalid JSON body").with_details(e.body_text()))?
        .0;

    let data = state.relay.forward_json(key, &payload).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

async fn n8n_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "n8n",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "endpoints": [
            "POST /facebook-ads-recreator",
            "POST /relay/:webhook",
        ],
    }))
}

pub(super) async fn not_found(uri: Uri) -> Response {
    ApiError::new(
        StatusCode::NOT_FOUND,
        format!("Route {} not found", uri.path()),
    )
    .into_response()
}
