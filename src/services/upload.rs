//! Image uploads to Cloudinary
//!
//! Admin uploads are forwarded as unsigned uploads with a named preset.
//! JPEG metadata (EXIF, XMP, comments) is removed first so location and
//! device details never reach the public CDN.

use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::site::validators::is_http_url;
use crate::types::{Result, StorefrontError};

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";

/// Time an upload may take before it is treated as failed
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(45);

/// Image upload seam
#[async_trait::async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload an image and return its public https URL.
    async fn upload(&self, image: Bytes, content_type: &str) -> Result<String>;

    fn is_configured(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub upload_preset: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            upload_preset: None,
            api_base: CLOUDINARY_API_BASE.to_string(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

pub struct CloudinaryUploader {
    config: CloudinaryConfig,
    http_client: reqwest::Client,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent("storefront/0.1")
            .build()
            .unwrap_or_default();
        Self { config, http_client }
    }

    async fn send(&self, cloud: &str, preset: &str, image: Bytes, content_type: &str) -> Result<String> {
        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            cloud
        );
        let file = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(format!("upload.{}", extension_for(content_type)))
            .mime_str(content_type)
            .map_err(|e| StorefrontError::Validation(format!("bad content type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("upload_preset", preset.to_string());

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorefrontError::Upstream(format!("Cloudinary request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Cloudinary upload failed");
            return Err(StorefrontError::Upstream(format!(
                "Cloudinary upload failed: {}",
                status
            )));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorefrontError::Upstream(format!("Invalid Cloudinary response: {}", e)))?;

        match parsed.secure_url {
            Some(url) if is_http_url(&url) => Ok(url),
            _ => Err(StorefrontError::Upstream("Cloudinary returned no secure_url".into())),
        }
    }
}

#[async_trait::async_trait]
impl ImageUploader for CloudinaryUploader {
    async fn upload(&self, image: Bytes, content_type: &str) -> Result<String> {
        let (Some(cloud), Some(preset)) = (&self.config.cloud_name, &self.config.upload_preset) else {
            return Err(StorefrontError::Config("Cloudinary cloud name or upload preset not set".into()));
        };

        let original_len = image.len();
        let image = if content_type == "image/jpeg" {
            strip_jpeg_metadata(image)
        } else {
            image
        };
        debug!(original_len, upload_len = image.len(), content_type, "Uploading image");

        match tokio::time::timeout(self.config.timeout, self.send(cloud, preset, image, content_type)).await {
            Ok(Ok(url)) => {
                info!(url = %url, "Image uploaded");
                Ok(url)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(timeout_secs = self.config.timeout.as_secs(), "Image upload timed out");
                Err(StorefrontError::Timeout(format!(
                    "upload exceeded {}s",
                    self.config.timeout.as_secs()
                )))
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.config.cloud_name.as_deref().is_some_and(|c| !c.is_empty())
            && self.config.upload_preset.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Content types accepted for upload.
pub fn is_supported_image(content_type: &str) -> bool {
    matches!(content_type, "image/jpeg" | "image/png" | "image/gif" | "image/webp")
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Drop APP1..APP15 and COM segments from a JPEG.
///
/// Returns the input unchanged if it is not a JPEG or its segment
/// structure cannot be walked.
pub fn strip_jpeg_metadata(image: Bytes) -> Bytes {
    match strip_segments(&image) {
        Some(stripped) => Bytes::from(stripped),
        None => image,
    }
}

fn strip_segments(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);
    let mut pos = 2;

    while pos < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        // Fill bytes
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        let marker = *data.get(marker_pos)?;
        let after_marker = marker_pos + 1;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&[0xFF, marker]);
                pos = after_marker;
            }
            0xD9 => {
                out.extend_from_slice(&[0xFF, marker]);
                return Some(out);
            }
            _ => {
                let len_bytes = data.get(after_marker..after_marker + 2)?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                if len < 2 {
                    return None;
                }
                let end = after_marker + len;
                let segment = data.get(marker_pos - 1..end)?;

                if marker == 0xDA {
                    // Start of scan: entropy-coded data follows, copy the rest
                    out.extend_from_slice(&[0xFF]);
                    out.extend_from_slice(&data[marker_pos..]);
                    return Some(out);
                }
                let is_metadata = matches!(marker, 0xE1..=0xEF | 0xFE);
                if !is_metadata {
                    out.extend_from_slice(segment);
                }
                pos = end;
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut seg = vec![0xFF, marker];
        seg.extend_from_slice(&len.to_be_bytes());
        seg.extend_from_slice(payload);
        seg
    }

    fn jpeg(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        for s in segments {
            data.extend_from_slice(s);
        }
        // SOS with a tiny scan and EOI
        data.extend_from_slice(&segment(0xDA, &[1, 2, 3]));
        data.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_strips_exif_and_comments() {
        let app0 = segment(0xE0, b"JFIF\0");
        let exif = segment(0xE1, b"Exif\0\0GPS");
        let comment = segment(0xFE, b"shot on phone");
        let dqt = segment(0xDB, &[0; 5]);
        let input = jpeg(&[app0.clone(), exif, comment, dqt.clone()]);
        let expected = jpeg(&[app0, dqt]);

        let output = strip_jpeg_metadata(Bytes::from(input));
        assert_eq!(output.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_non_jpeg_passthrough() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\nrest");
        assert_eq!(strip_jpeg_metadata(png.clone()), png);
    }

    #[test]
    fn test_truncated_jpeg_passthrough() {
        let broken = Bytes::from(vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x40, 0x01]);
        assert_eq!(strip_jpeg_metadata(broken.clone()), broken);
    }

    #[test]
    fn test_supported_images() {
        assert!(is_supported_image("image/jpeg"));
        assert!(is_supported_image("image/webp"));
        assert!(!is_supported_image("text/html"));
        assert_eq!(extension_for("image/png"), "png");
    }

    #[tokio::test]
    async fn test_unconfigured_upload() {
        let uploader = CloudinaryUploader::new(CloudinaryConfig::default());
        assert!(!uploader.is_configured());
        let err = uploader
            .upload(Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::Config(_)));
    }
}
