//! Hosted checkout sessions for merch preorders
//!
//! Creates Stripe Checkout sessions over the REST API. The secret key never
//! leaves the server; browsers only receive the session redirect URL.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::types::{Result, StorefrontError};

use super::catalog::SIZES;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_MERCH_SUCCESS_URL: &str = "https://ghostriderjunior.com/merch?status=success";
pub const DEFAULT_MERCH_CANCEL_URL: &str = "https://ghostriderjunior.com/merch?status=cancelled";

/// Countries the preorder ships to
pub const SHIPPING_COUNTRIES: [&str; 8] = ["US", "GB", "DE", "FR", "HU", "PL", "NL", "RO"];

/// Payment session seam
#[async_trait::async_trait]
pub trait CheckoutService: Send + Sync {
    /// Create a session for one hoodie in `size` and return its redirect URL.
    async fn create_session(&self, size: &str) -> Result<String>;

    /// Whether the service has the credentials it needs.
    fn is_configured(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub hoodie_price_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            hoodie_price_id: None,
            success_url: DEFAULT_MERCH_SUCCESS_URL.to_string(),
            cancel_url: DEFAULT_MERCH_CANCEL_URL.to_string(),
            api_base: STRIPE_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

pub struct StripeCheckout {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeCheckout {
    pub fn new(config: StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("storefront/0.1")
            .build()
            .unwrap_or_default();
        Self { config, http_client }
    }

    /// Form fields for a one-hoodie preorder session.
    pub fn session_form(&self, price_id: &str, size: &str) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[]".into(), "card".into()),
            ("line_items[0][price]".into(), price_id.into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("customer_creation".into(), "if_required".into()),
            ("metadata[order_type]".into(), "preorder".into()),
            ("metadata[hoodie_size]".into(), size.into()),
            ("custom_fields[0][key]".into(), "size".into()),
            ("custom_fields[0][label][type]".into(), "custom".into()),
            ("custom_fields[0][label][custom]".into(), "Hoodie Size".into()),
            ("custom_fields[0][type]".into(), "dropdown".into()),
            ("success_url".into(), self.config.success_url.clone()),
            ("cancel_url".into(), self.config.cancel_url.clone()),
        ];
        for (i, country) in SHIPPING_COUNTRIES.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{}]", i),
                (*country).to_string(),
            ));
        }
        for (i, option) in SIZES.iter().enumerate() {
            form.push((format!("custom_fields[0][dropdown][options][{}][label]", i), (*option).to_string()));
            form.push((format!("custom_fields[0][dropdown][options][{}][value]", i), (*option).to_string()));
        }
        form
    }
}

#[async_trait::async_trait]
impl CheckoutService for StripeCheckout {
    async fn create_session(&self, size: &str) -> Result<String> {
        let (Some(secret), Some(price_id)) = (&self.config.secret_key, &self.config.hoodie_price_id) else {
            return Err(StorefrontError::Config("Stripe secret key or hoodie price id not set".into()));
        };

        let url = format!("{}/v1/checkout/sessions", self.config.api_base.trim_end_matches('/'));
        let form = self.session_form(price_id, size);
        debug!(size, "Creating checkout session");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(secret)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Stripe request failed");
                StorefrontError::Upstream(format!("Stripe request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Stripe rejected checkout session");
            return Err(StorefrontError::Upstream(format!("Stripe returned {}", status)));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| StorefrontError::Upstream(format!("Invalid Stripe response: {}", e)))?;

        let redirect = session
            .url
            .ok_or_else(|| StorefrontError::Upstream("Stripe session has no URL".into()))?;
        info!(session_id = %session.id, size, "Checkout session created");
        Ok(redirect)
    }

    fn is_configured(&self) -> bool {
        self.config.secret_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.config.hoodie_price_id.as_deref().is_some_and(|p| !p.is_empty())
    }
}
