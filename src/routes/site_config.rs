//! Public site configuration for the landing page
//!
//! Admin secrets never leave the server; the page only learns whether an
//! admin unlock is possible.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode, Uri};
use serde::Serialize;

use super::response::{json_response, query_params};
use crate::server::AppState;
use crate::site::config::{diagnose, ConfigCheck, PaymentTier};
use crate::types::{Result, StorefrontError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicConfig<'a> {
    publishable_key: Option<&'a str>,
    price_monthly: Option<&'a str>,
    price_one_time: Option<&'a str>,
    success_url: &'a str,
    cancel_url: &'a str,
    payment_link_monthly: Option<&'a str>,
    payment_link_one_time: Option<&'a str>,
    checkout_enabled: bool,
    admin_enabled: bool,
    /// Only sent while checkout is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<Vec<ConfigCheck>>,
}

/// GET /api/config
pub fn handle_site_config(state: &AppState) -> Response<Full<Bytes>> {
    let site = &state.site;
    let checkout_enabled = site.checkout_enabled();
    let body = PublicConfig {
        publishable_key: site.publishable_key.as_deref(),
        price_monthly: site.price_monthly.as_deref(),
        price_one_time: site.price_one_time.as_deref(),
        success_url: &site.success_url,
        cancel_url: &site.cancel_url,
        payment_link_monthly: site.payment_link_monthly.as_deref(),
        payment_link_one_time: site.payment_link_one_time.as_deref(),
        checkout_enabled,
        admin_enabled: state.admin.is_enabled(),
        diagnostics: (!checkout_enabled).then(|| diagnose(site)),
    };
    json_response(StatusCode::OK, &body)
}

/// GET /api/checkout/link?tier=monthly|one-time
pub fn handle_payment_link(state: &AppState, uri: &Uri) -> Result<Response<Full<Bytes>>> {
    let params = query_params(uri);
    let raw = params.get("tier").map(String::as_str).unwrap_or("monthly");
    let tier = PaymentTier::parse(raw)
        .ok_or_else(|| StorefrontError::Validation(format!("unknown tier '{}'", raw)))?;
    let url = state
        .site
        .payment_link(tier)
        .ok_or_else(|| StorefrontError::NotFound(format!("no payment link for {}", raw)))?;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "tier": tier, "url": url }),
    ))
}
