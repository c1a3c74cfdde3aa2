//! Authentication and authorization
//!
//! Provides:
//! - Admin unlock sessions (HS256 tokens, revocable)
//! - Admin secret verification with Argon2 or plain comparison
//! - Bearer token extraction for signed-in visitors

pub mod admin_token;
pub mod password;

pub use admin_token::{AdminCapability, AdminGate, AdminSession, ADMIN_TOKEN_HEADER};
pub use password::{hash_secret, verify_secret};

use hyper::HeaderMap;

/// Bearer token from the Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, AUTHORIZATION};

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }
}
