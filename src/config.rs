//! Configuration for the storefront server
//!
//! CLI arguments and environment variable handling using clap. A `.env`
//! file in the working directory is loaded first by `main`.

use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::services::checkout::{StripeConfig, DEFAULT_MERCH_CANCEL_URL, DEFAULT_MERCH_SUCCESS_URL, STRIPE_API_BASE};
use crate::services::identity::{DiscordConfig, DISCORD_API_BASE};
use crate::services::upload::{CloudinaryConfig, CLOUDINARY_API_BASE};
use crate::site::config::{resolve, EffectiveConfig, HtmlMetaTags, PartialConfig};

/// Storefront - API server for the GhostriderJunior creator site
#[derive(Parser, Debug, Clone)]
#[command(name = "storefront")]
#[command(about = "Feed, questions, changelog and merch checkout for the GhostriderJunior site")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store fallback, insecure token key)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "storefront")]
    pub mongodb_db: String,

    /// Use the in-memory store instead of MongoDB
    #[arg(long, env = "MEMORY_STORE", default_value = "false")]
    pub memory_store: bool,

    /// Seconds between feed reloads that pick up external database writes
    #[arg(long, env = "FEED_REFRESH_SECS", default_value = "15")]
    pub feed_refresh_secs: u64,

    /// Key for signing admin session tokens (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Admin session lifetime in seconds
    #[arg(long, env = "ADMIN_SESSION_SECONDS", default_value = "43200")]
    pub admin_session_seconds: u64,

    /// Timeout for calls to the payment service, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body for JSON endpoints, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "65536")]
    pub max_body_bytes: usize,

    /// Visitors whose like ledgers are kept in memory
    #[arg(long, env = "LIKE_LEDGER_MAX_VISITORS", default_value = "10000")]
    pub like_ledger_max_visitors: usize,

    /// Seconds a visitor's like ledger survives without activity
    #[arg(long, env = "LIKE_LEDGER_IDLE_SECS", default_value = "604800")]
    pub like_ledger_idle_secs: u64,

    /// Directory holding the built site (index.html, assets, hoodie.glb)
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub checkout: CheckoutArgs,

    #[command(flatten)]
    pub upload: UploadArgs,

    /// Discord API base URL for identity lookups
    #[arg(long, env = "DISCORD_API_BASE", default_value = DISCORD_API_BASE)]
    pub discord_api_base: String,

    /// Print an Argon2 hash of the given secret (for GRJ_ADMIN_PASSWORD) and exit
    #[arg(long)]
    pub hash_secret: Option<String>,
}

/// Site configuration given explicitly. Takes precedence over the runtime
/// config file and the page's meta tags.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SiteArgs {
    #[arg(long, env = "GRJ_PUBLISHABLE_KEY")]
    pub publishable_key: Option<String>,

    #[arg(long, env = "GRJ_PRICE_MONTHLY")]
    pub price_monthly: Option<String>,

    #[arg(long, env = "GRJ_PRICE_ONETIME")]
    pub price_one_time: Option<String>,

    #[arg(long, env = "GRJ_SUCCESS_URL")]
    pub success_url: Option<String>,

    #[arg(long, env = "GRJ_CANCEL_URL")]
    pub cancel_url: Option<String>,

    #[arg(long, env = "GRJ_ADMIN_KEY")]
    pub admin_key: Option<String>,

    /// Plain text or an Argon2 hash from --hash-secret
    #[arg(long, env = "GRJ_ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    #[arg(long, env = "GRJ_LINK_MONTHLY")]
    pub payment_link_monthly: Option<String>,

    #[arg(long, env = "GRJ_LINK_ONETIME")]
    pub payment_link_one_time: Option<String>,

    /// JSON file shaped like the browser's `window.__GRJ_CONFIG`
    #[arg(long, env = "SITE_CONFIG_FILE")]
    pub site_config_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckoutArgs {
    /// Stripe secret key (server side only)
    #[arg(long, env = "STRIPE_SECRET_KEY")]
    pub stripe_secret_key: Option<String>,

    /// Stripe price id of the preorder hoodie
    #[arg(long, env = "HOODIE_PRICE_ID")]
    pub hoodie_price_id: Option<String>,

    #[arg(long, env = "MERCH_SUCCESS_URL", default_value = DEFAULT_MERCH_SUCCESS_URL)]
    pub merch_success_url: String,

    #[arg(long, env = "MERCH_CANCEL_URL", default_value = DEFAULT_MERCH_CANCEL_URL)]
    pub merch_cancel_url: String,

    #[arg(long, env = "STRIPE_API_BASE", default_value = STRIPE_API_BASE)]
    pub stripe_api_base: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Unsigned upload preset
    #[arg(long, env = "CLOUDINARY_UPLOAD_PRESET")]
    pub cloudinary_upload_preset: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_BASE", default_value = CLOUDINARY_API_BASE)]
    pub cloudinary_api_base: String,

    /// Seconds before an upload is treated as failed
    #[arg(long, env = "UPLOAD_TIMEOUT_SECS", default_value = "45")]
    pub upload_timeout_secs: u64,

    /// Largest accepted image, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

impl SiteArgs {
    /// The explicit configuration source
    pub fn explicit(&self) -> PartialConfig {
        PartialConfig {
            publishable_key: self.publishable_key.clone(),
            price_monthly: self.price_monthly.clone(),
            price_one_time: self.price_one_time.clone(),
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
            admin_key: self.admin_key.clone(),
            admin_password: self.admin_password.clone(),
            payment_link_monthly: self.payment_link_monthly.clone(),
            payment_link_one_time: self.payment_link_one_time.clone(),
        }
    }
}

impl Args {
    /// Key for admin tokens (fixed insecure key in dev mode when unset)
    pub fn jwt_secret(&self) -> String {
        non_empty(&self.jwt_secret).unwrap_or_else(|| "dev-only-insecure-secret".to_string())
    }

    pub fn admin_session_ttl(&self) -> Duration {
        Duration::from_secs(self.admin_session_seconds)
    }

    /// Resolve the site configuration from all three sources.
    ///
    /// A missing or unreadable runtime file or index.html is logged and
    /// treated as an empty source.
    pub fn resolve_site_config(&self) -> EffectiveConfig {
        let runtime_global = match &self.site.site_config_file {
            Some(path) => PartialConfig::from_json_file(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring site config file");
                PartialConfig::default()
            }),
            None => PartialConfig::default(),
        };

        let meta = match &self.static_dir {
            Some(dir) => load_meta_tags(&dir.join("index.html")),
            None => HtmlMetaTags::default(),
        };

        let config = resolve(&self.site.explicit(), &runtime_global, &meta);
        info!(
            checkout_enabled = config.checkout_enabled(),
            meta_tags = meta.len(),
            "Site configuration resolved"
        );
        config
    }

    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig {
            secret_key: non_empty(&self.checkout.stripe_secret_key),
            hoodie_price_id: non_empty(&self.checkout.hoodie_price_id),
            success_url: self.checkout.merch_success_url.clone(),
            cancel_url: self.checkout.merch_cancel_url.clone(),
            api_base: self.checkout.stripe_api_base.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn cloudinary_config(&self) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: non_empty(&self.upload.cloudinary_cloud_name),
            upload_preset: non_empty(&self.upload.cloudinary_upload_preset),
            api_base: self.upload.cloudinary_api_base.clone(),
            timeout: Duration::from_secs(self.upload.upload_timeout_secs),
        }
    }

    pub fn discord_config(&self) -> DiscordConfig {
        DiscordConfig {
            api_base: self.discord_api_base.clone(),
            ..DiscordConfig::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && non_empty(&self.jwt_secret).is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.admin_session_seconds == 0 {
            return Err("ADMIN_SESSION_SECONDS must be greater than zero".to_string());
        }

        if self.upload.upload_timeout_secs == 0 {
            return Err("UPLOAD_TIMEOUT_SECS must be greater than zero".to_string());
        }

        if self.like_ledger_max_visitors == 0 {
            return Err("LIKE_LEDGER_MAX_VISITORS must be greater than zero".to_string());
        }

        if self.feed_refresh_secs == 0 {
            return Err("FEED_REFRESH_SECS must be greater than zero".to_string());
        }

        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(format!("STATIC_DIR {} is not a directory", dir.display()));
            }
        }

        Ok(())
    }
}

fn load_meta_tags(index: &Path) -> HtmlMetaTags {
    if !index.exists() {
        return HtmlMetaTags::default();
    }
    HtmlMetaTags::load(index).unwrap_or_else(|e| {
        warn!(path = %index.display(), error = %e, "Could not read page metadata");
        HtmlMetaTags::default()
    })
}
