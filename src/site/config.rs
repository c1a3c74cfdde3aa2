//! Site configuration resolution
//!
//! Every field of [`EffectiveConfig`] comes from the first non-empty value
//! among three sources, in order:
//!
//! 1. explicit values (CLI flags and environment variables)
//! 2. the runtime global (a JSON file shaped like `window.__GRJ_CONFIG`)
//! 3. page metadata (`<meta name="grj-*">` tags in the site's `index.html`)
//!
//! Only the success and cancel URLs have defaults. Resolution never fails:
//! a missing value disables the feature that needs it, and [`diagnose`]
//! reports which ones are missing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::types::{Result, StorefrontError};

pub const DEFAULT_SUCCESS_URL: &str = "https://ghostriderjunior.com/success";
pub const DEFAULT_CANCEL_URL: &str = "https://ghostriderjunior.com/cancel";

/// Meta tag names read by [`PartialConfig::from_metadata`].
pub mod meta_names {
    pub const PUBLISHABLE_KEY: &str = "grj-publishable-key";
    pub const PRICE_MONTHLY: &str = "grj-price-monthly";
    pub const PRICE_ONE_TIME: &str = "grj-price-onetime";
    pub const SUCCESS_URL: &str = "grj-success-url";
    pub const CANCEL_URL: &str = "grj-cancel-url";
    pub const ADMIN_KEY: &str = "grj-admin-key";
    pub const ADMIN_PASSWORD: &str = "grj-admin-password";
    pub const LINK_MONTHLY: &str = "grj-link-monthly";
    pub const LINK_ONE_TIME: &str = "grj-link-onetime";
}

/// One configuration source. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    pub publishable_key: Option<String>,
    pub price_monthly: Option<String>,
    pub price_one_time: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub admin_key: Option<String>,
    pub admin_password: Option<String>,
    pub payment_link_monthly: Option<String>,
    pub payment_link_one_time: Option<String>,
}

impl PartialConfig {
    /// Read every field from page metadata by its fixed `grj-*` name.
    pub fn from_metadata(lookup: &impl MetadataLookup) -> Self {
        use meta_names::*;
        Self {
            publishable_key: lookup.meta(PUBLISHABLE_KEY),
            price_monthly: lookup.meta(PRICE_MONTHLY),
            price_one_time: lookup.meta(PRICE_ONE_TIME),
            success_url: lookup.meta(SUCCESS_URL),
            cancel_url: lookup.meta(CANCEL_URL),
            admin_key: lookup.meta(ADMIN_KEY),
            admin_password: lookup.meta(ADMIN_PASSWORD),
            payment_link_monthly: lookup.meta(LINK_MONTHLY),
            payment_link_one_time: lookup.meta(LINK_ONE_TIME),
        }
    }

    /// Load the runtime-global source from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            StorefrontError::Config(format!("{}: {}", path.display(), e))
        })
    }
}

/// Read access to declarative page metadata.
pub trait MetadataLookup {
    fn meta(&self, name: &str) -> Option<String>;
}

impl<F> MetadataLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn meta(&self, name: &str) -> Option<String> {
        self(name)
    }
}

impl MetadataLookup for HashMap<String, String> {
    fn meta(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// `<meta name=... content=...>` pairs scraped from an HTML document.
#[derive(Debug, Clone, Default)]
pub struct HtmlMetaTags {
    tags: HashMap<String, String>,
}

fn meta_tag_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<meta\b([^>]*)>").ok())
        .as_ref()
}

fn attribute_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)([a-z][a-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok())
        .as_ref()
}

impl HtmlMetaTags {
    /// Collect every meta tag that has both a `name` and a `content`.
    /// The first tag with a given name wins.
    pub fn parse(html: &str) -> Self {
        let mut tags = HashMap::new();
        let (Some(tag_re), Some(attr_re)) = (meta_tag_re(), attribute_re()) else {
            return Self { tags };
        };
        for tag in tag_re.captures_iter(html) {
            let mut name = None;
            let mut content = None;
            for attr in attr_re.captures_iter(&tag[1]) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .map(|m| m.as_str().to_string());
                match attr[1].to_ascii_lowercase().as_str() {
                    "name" => name = value,
                    "content" => content = value,
                    _ => {}
                }
            }
            if let (Some(name), Some(content)) = (name, content) {
                tags.entry(name).or_insert(content);
            }
        }
        Self { tags }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::parse(&html))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl MetadataLookup for HtmlMetaTags {
    fn meta(&self, name: &str) -> Option<String> {
        self.tags.get(name).cloned()
    }
}

/// Resolved site configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub publishable_key: Option<String>,
    pub price_monthly: Option<String>,
    pub price_one_time: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub admin_key: Option<String>,
    pub admin_password: Option<String>,
    pub payment_link_monthly: Option<String>,
    pub payment_link_one_time: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            publishable_key: None,
            price_monthly: None,
            price_one_time: None,
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            cancel_url: DEFAULT_CANCEL_URL.to_string(),
            admin_key: None,
            admin_password: None,
            payment_link_monthly: None,
            payment_link_one_time: None,
        }
    }
}

impl EffectiveConfig {
    /// Checkout needs the publishable key and both price ids.
    pub fn checkout_enabled(&self) -> bool {
        self.publishable_key.is_some() && self.price_monthly.is_some() && self.price_one_time.is_some()
    }

    /// Payment link for a tier of the landing page toggle.
    pub fn payment_link(&self, tier: PaymentTier) -> Option<&str> {
        match tier {
            PaymentTier::Monthly => self.payment_link_monthly.as_deref(),
            PaymentTier::OneTime => self.payment_link_one_time.as_deref(),
        }
    }
}

/// Tier selected on the landing page's payment toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentTier {
    Monthly,
    OneTime,
}

impl PaymentTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "one-time" | "onetime" | "one_time" => Some(Self::OneTime),
            _ => None,
        }
    }
}

fn pick(sources: [&Option<String>; 3]) -> Option<String> {
    sources
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
}

/// Merge the three sources field by field.
pub fn resolve(
    explicit: &PartialConfig,
    runtime_global: &PartialConfig,
    page_metadata: &impl MetadataLookup,
) -> EffectiveConfig {
    let meta = PartialConfig::from_metadata(page_metadata);
    let field = |f: fn(&PartialConfig) -> &Option<String>| {
        pick([f(explicit), f(runtime_global), f(&meta)])
    };

    EffectiveConfig {
        publishable_key: field(|c| &c.publishable_key),
        price_monthly: field(|c| &c.price_monthly),
        price_one_time: field(|c| &c.price_one_time),
        success_url: field(|c| &c.success_url).unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string()),
        cancel_url: field(|c| &c.cancel_url).unwrap_or_else(|| DEFAULT_CANCEL_URL.to_string()),
        admin_key: field(|c| &c.admin_key),
        admin_password: field(|c| &c.admin_password),
        payment_link_monthly: field(|c| &c.payment_link_monthly),
        payment_link_one_time: field(|c| &c.payment_link_one_time),
    }
}

/// One line of the configuration self-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigCheck {
    pub name: &'static str,
    pub pass: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConfigCheck {
    fn new(name: &'static str, pass: bool) -> Self {
        Self {
            name,
            pass,
            message: None,
        }
    }
}

fn publishable_key_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^pk_(test|live)_[A-Za-z0-9]{10,}$").ok())
        .as_ref()
}

/// Configuration self-check shown on the landing page when checkout is off.
pub fn diagnose(config: &EffectiveConfig) -> Vec<ConfigCheck> {
    let key = config.publishable_key.as_deref().unwrap_or("");
    let looks_like_secret = key.starts_with("sk_");

    vec![
        ConfigCheck::new(
            "Publishable key present & shape",
            publishable_key_re().is_some_and(|re| re.is_match(key)),
        ),
        ConfigCheck::new("Monthly price present", config.price_monthly.is_some()),
        ConfigCheck::new("One-time price present", config.price_one_time.is_some()),
        ConfigCheck::new("Success URL present", !config.success_url.is_empty()),
        ConfigCheck::new("Cancel URL present", !config.cancel_url.is_empty()),
        ConfigCheck {
            name: "No secret key in client",
            pass: !looks_like_secret,
            message: looks_like_secret.then(|| "Never expose sk_ keys in the browser".to_string()),
        },
    ]
}
