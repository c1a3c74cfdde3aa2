//! Merch catalog and preorder checkout

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::{error, info};

use super::response::{json_response, message_response, method_not_allowed};
use crate::server::AppState;
use crate::services::catalog::{catalog, normalize_size, DEFAULT_SIZE, SIZES};

#[derive(Debug, Default, Deserialize)]
struct CheckoutRequest {
    #[serde(default)]
    size: Option<String>,
}

/// GET /api/merch
pub fn handle_merch() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "drop": "01",
            "items": catalog(),
            "sizes": SIZES,
            "defaultSize": DEFAULT_SIZE,
        }),
    )
}

/// /api/create-checkout-session
///
/// Only POST is accepted. Failures from the payment service are logged and
/// reported with a fixed message.
pub async fn handle_create_checkout_session(
    state: &AppState,
    method: &Method,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    if *method != Method::POST {
        return method_not_allowed("POST");
    }

    let request: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(_) => return message_response(StatusCode::BAD_REQUEST, "Invalid JSON body"),
        }
    };

    let Some(raw_size) = request.size.filter(|s| !s.trim().is_empty()) else {
        return message_response(StatusCode::BAD_REQUEST, "Size is required");
    };
    let Some(size) = normalize_size(&raw_size) else {
        return message_response(StatusCode::BAD_REQUEST, "Unknown size");
    };

    match state.checkout.create_session(size).await {
        Ok(url) => {
            info!(size, "Redirecting to checkout");
            json_response(StatusCode::OK, &serde_json::json!({ "url": url }))
        }
        Err(e) => {
            error!(size, error = %e, "Checkout session failed");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Stripe checkout error")
        }
    }
}
