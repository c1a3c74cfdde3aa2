//! Static hosting of the built site
//!
//! Serves files under `--static-dir`. Paths without a file extension fall
//! back to `index.html` so client-side routes (`/merch`, `/questions`)
//! resolve to the single-page app.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL};
use hyper::{Method, Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::response::{full_response, method_not_allowed, not_found_response};

/// Resolve a request path inside `root`, refusing anything that escapes it.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = decoded.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{}index.html", relative)
    } else {
        relative.to_string()
    };

    let mut resolved = root.to_path_buf();
    for component in Path::new(&relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

/// Guess MIME type from file extension
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("glb") => "model/gltf-binary",
        Some("gltf") => "model/gltf+json",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    }
}

async fn read_file(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read static file");
            None
        }
    }
}

/// GET/HEAD for anything outside `/api`
pub async fn handle_static(root: Option<&Path>, method: &Method, request_path: &str) -> Response<Full<Bytes>> {
    if *method != Method::GET && *method != Method::HEAD {
        return method_not_allowed("GET, HEAD");
    }
    let Some(root) = root else {
        return not_found_response(request_path);
    };
    let Some(path) = resolve_path(root, request_path) else {
        debug!(path = %request_path, "Rejected path outside the site root");
        return not_found_response(request_path);
    };

    let (path, bytes) = match read_file(&path).await {
        Some(bytes) => (path, bytes),
        None if path.extension().is_none() => {
            let index = root.join("index.html");
            match read_file(&index).await {
                Some(bytes) => (index, bytes),
                None => return not_found_response(request_path),
            }
        }
        None => return not_found_response(request_path),
    };

    let content_type = guess_content_type(&path);
    let body = if *method == Method::HEAD {
        Bytes::new()
    } else {
        Bytes::from(bytes)
    };
    let mut response = full_response(StatusCode::OK, content_type, body);
    let cache = if content_type.starts_with("text/html") {
        "no-cache"
    } else {
        "public, max-age=3600"
    };
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(cache));
    response
}
