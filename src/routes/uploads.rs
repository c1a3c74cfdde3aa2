//! Admin image uploads
//!
//! The raw request body is the image. It is passed to the uploader as
//! received; the uploader strips JPEG metadata before sending it on.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Response, StatusCode};
use tracing::info;

use super::response::json_response;
use crate::server::AppState;
use crate::services::upload::is_supported_image;
use crate::types::{Result, StorefrontError};

/// POST /api/uploads
pub async fn handle_upload(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !is_supported_image(&content_type) {
        return Err(StorefrontError::Validation(format!(
            "unsupported image type '{}'",
            content_type
        )));
    }
    if body.is_empty() {
        return Err(StorefrontError::Validation("image is empty".into()));
    }

    let bytes = body.len();
    let url = state.uploader.upload(body, &content_type).await?;
    info!(bytes, url = %url, "Image uploaded");

    Ok(json_response(StatusCode::CREATED, &serde_json::json!({ "url": url })))
}
