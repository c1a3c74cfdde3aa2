//! JSON response and request helpers shared by the route handlers

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Response, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::types::{Result, StorefrontError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response with a body and the permissive CORS header every route sends
pub fn full_response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => {
            let mut response = full_response(status, "application/json", Bytes::from(json));
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed")
        }
    }
}

/// `{ "error": message }`
pub fn message_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    full_response(status, "application/json", Bytes::from(body.to_string()))
}

pub fn error_response(err: &StorefrontError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(code = err.code(), error = %err, "Request failed");
    } else {
        debug!(code = err.code(), error = %err, "Request rejected");
    }
    let body = serde_json::json!({
        "error": err.public_message(),
        "code": err.code(),
    });
    full_response(status, "application/json", Bytes::from(body.to_string()))
}

/// Flatten a handler result into a response.
pub fn respond(result: Result<Response<Full<Bytes>>>) -> Response<Full<Bytes>> {
    result.unwrap_or_else(|e| error_response(&e))
}

pub fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response = message_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
    response
}

pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });
    full_response(StatusCode::NOT_FOUND, "application/json", Bytes::from(body.to_string()))
}

pub fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = full_response(StatusCode::NO_CONTENT, "text/plain", Bytes::new());
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization, X-Admin-Token, X-Visitor-Id"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    response
}

/// Collect a request body, rejecting anything over `limit` bytes.
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(StorefrontError::Validation(
            format!("request body exceeds {} bytes", limit),
        )),
        Err(e) => Err(StorefrontError::Http(format!("failed to read request body: {}", e))),
    }
}

/// Parse a JSON request body; an empty body is a validation error.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    if body.is_empty() {
        return Err(StorefrontError::Validation("request body is required".into()));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Query string as a map; repeated keys keep the last value.
pub fn query_params(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}
