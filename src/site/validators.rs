//! URL and free-text validators
//!
//! Parse failures never escape: every predicate here answers with a plain
//! `bool` so callers can disable a submit instead of handling an error.

use url::Url;

/// Maximum characters in a caption, question, answer or comment.
pub const CAPTION_LIMIT: usize = 2200;

/// Whether `url` is safe to keep as a link.
///
/// Empty input means "no URL provided" and is accepted. Anything else must
/// parse as an absolute URL and must not use the `javascript:` scheme.
pub fn is_plausible_url(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme() != "javascript",
        Err(_) => false,
    }
}

/// Whether `url` is a non-empty http(s) URL.
pub fn is_http_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Whether an image with this URL should be rendered at all.
pub fn should_render_image(url: Option<&str>) -> bool {
    match url {
        Some(u) if !u.is_empty() => is_plausible_url(u),
        _ => false,
    }
}

/// Whether `text` fits within [`CAPTION_LIMIT`] characters.
///
/// Counts Unicode scalar values, not bytes.
pub fn check_caption(text: &str) -> bool {
    text.chars().count() <= CAPTION_LIMIT
}

/// Trim user input and return it only if it is non-empty and within the cap.
pub fn accept_text(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !check_caption(trimmed) {
        return None;
    }
    Some(trimmed)
}
