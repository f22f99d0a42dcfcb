//! Turning the selected video into an HTTP response.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use url::Url;

use super::error::ExtractError;
use super::fetch::DownloadedAsset;
use super::platform::AdPlatform;
use super::selection::{Payload, SelectedVideo};
use crate::constants::DEFAULT_VIDEO_MIME;

/// Form field carrying the video in a multipart envelope.
pub const MULTIPART_VIDEO_FIELD: &str = "video";

/// Representation the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// The video bytes as a downloadable file.
    RawAttachment { file_name: String },
    /// `multipart/form-data` with the video plus string fields.
    MultipartForm {
        file_name: String,
        fields: Vec<(String, String)>,
    },
    /// `{platform, videoUrl, base64}`.
    Base64Json,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64VideoBody {
    pub platform: AdPlatform,
    pub video_url: String,
    pub base64: String,
}

/// Emit `selected` in the requested representation.
///
/// `target_url` is the ad page the video came from; it decides the platform
/// reported in JSON output.
pub async fn deliver(
    selected: SelectedVideo,
    mode: &OutputMode,
    target_url: &Url,
) -> Result<Response, ExtractError> {
    let SelectedVideo { candidate, payload } = selected;
    let download_error = |source| ExtractError::Download {
        url: candidate.source_url.to_string(),
        source,
    };

    match mode {
        OutputMode::RawAttachment { file_name } => Ok(attachment(payload, file_name)),
        OutputMode::MultipartForm { file_name, fields } => {
            let asset = payload.into_asset().await.map_err(download_error)?;
            Ok(multipart(&asset, file_name, fields))
        }
        OutputMode::Base64Json => {
            let asset = payload.into_asset().await.map_err(download_error)?;
            let body = Base64VideoBody {
                platform: AdPlatform::classify(target_url.as_str()).unwrap_or(AdPlatform::Meta),
                video_url: candidate.source_url.to_string(),
                base64: STANDARD.encode(&asset.bytes),
            };
            Ok(Json(body).into_response())
        }
    }
}

fn attachment(payload: Payload, file_name: &str) -> Response {
    let disposition = format!("attachment; filename=\"{file_name}\"");
    match payload {
        Payload::Buffered(asset) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, video_mime(&asset.content_type).to_string()),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CONTENT_LENGTH, asset.size_bytes.to_string()),
            ],
            asset.bytes,
        )
            .into_response(),
        Payload::Streamed(stream) => {
            let content_type = video_mime(&stream.content_type).to_string();
            let content_length = stream.content_length;
            let mut response = (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                Body::from_stream(stream.body),
            )
                .into_response();
            if let Some(len) = content_length {
                response
                    .headers_mut()
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            }
            response
        }
    }
}

fn multipart(asset: &DownloadedAsset, file_name: &str, fields: &[(String, String)]) -> Response {
    let boundary = new_boundary();
    let body = encode_multipart(&boundary, asset, file_name, fields);
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            ),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

fn new_boundary() -> String {
    format!("--------------------------{:024x}", rand::random::<u128>() >> 32)
}

/// Serialize one file part followed by plain text parts.
fn encode_multipart(
    boundary: &str,
    asset: &DownloadedAsset,
    file_name: &str,
    fields: &[(String, String)],
) -> Bytes {
    let mut out = Vec::with_capacity(asset.bytes.len() + 512);

    out.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{MULTIPART_VIDEO_FIELD}\"; filename=\"{file_name}\"\r\nContent-Type: {}\r\n\r\n",
            video_mime(&asset.content_type)
        )
        .as_bytes(),
    );
    out.extend_from_slice(&asset.bytes);
    out.extend_from_slice(b"\r\n");

    for (name, value) in fields {
        out.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Bytes::from(out)
}

/// Upstream content type when it names a video, otherwise MP4.
fn video_mime(content_type: &str) -> &str {
    if content_type.starts_with("video/") {
        content_type
    } else {
        DEFAULT_VIDEO_MIME
    }
}
