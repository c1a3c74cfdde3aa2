//! Social-login identity verification
//!
//! Browsers sign in with Discord and send the OAuth access token as a
//! bearer token. The token is resolved to a user through Discord's
//! `users/@me` endpoint and cached briefly so a burst of comments does not
//! hit the provider once per request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::{Result, StorefrontError};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DISCORD_CDN: &str = "https://cdn.discordapp.com";

/// A signed-in site visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

/// Identity provider seam
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer access token to the user it belongs to.
    async fn resolve(&self, access_token: &str) -> Result<AuthUser>;
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub api_base: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub max_cache_entries: usize,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: DISCORD_API_BASE.to_string(),
            cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
            max_cache_entries: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    global_name: Option<String>,
    avatar: Option<String>,
    email: Option<String>,
}

impl From<DiscordUser> for AuthUser {
    fn from(u: DiscordUser) -> Self {
        let avatar_url = u
            .avatar
            .as_ref()
            .map(|hash| format!("{}/avatars/{}/{}.png", DISCORD_CDN, u.id, hash));
        Self {
            display_name: u.global_name.filter(|n| !n.is_empty()).unwrap_or(u.username),
            id: u.id,
            avatar_url,
            email: u.email,
        }
    }
}

struct CachedUser {
    user: AuthUser,
    expires_at: Instant,
}

pub struct DiscordIdentity {
    config: DiscordConfig,
    cache: RwLock<HashMap<String, CachedUser>>,
    http_client: reqwest::Client,
}

/// Cache key that does not keep raw tokens in memory.
fn token_key(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

impl DiscordIdentity {
    pub fn new(config: DiscordConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("storefront/0.1")
            .build()
            .unwrap_or_default();
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            http_client,
        }
    }

    async fn get_cached(&self, key: &str) -> Option<AuthUser> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|c| c.expires_at > Instant::now())
            .map(|c| c.user.clone())
    }

    async fn cache_user(&self, key: String, user: AuthUser) {
        let mut cache = self.cache.write().await;
        if cache.len() >= self.config.max_cache_entries {
            cache.retain(|_, v| v.expires_at > Instant::now());
            if cache.len() >= self.config.max_cache_entries {
                cache.clear();
            }
        }
        cache.insert(
            key,
            CachedUser {
                user,
                expires_at: Instant::now() + self.config.cache_ttl,
            },
        );
    }
}

#[async_trait::async_trait]
impl IdentityProvider for DiscordIdentity {
    async fn resolve(&self, access_token: &str) -> Result<AuthUser> {
        if access_token.is_empty() {
            return Err(StorefrontError::Unauthorized("missing access token".into()));
        }
        let key = token_key(access_token);
        if let Some(user) = self.get_cached(&key).await {
            debug!(user_id = %user.id, "Identity resolved from cache");
            return Ok(user);
        }

        let url = format!("{}/users/@me", self.config.api_base.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Discord identity request failed");
                StorefrontError::Upstream(format!("identity provider unreachable: {}", e))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StorefrontError::Unauthorized("access token rejected".into()));
        }
        if !status.is_success() {
            warn!(status = %status, "Discord identity lookup failed");
            return Err(StorefrontError::Upstream(format!("identity provider returned {}", status)));
        }

        let user: AuthUser = response
            .json::<DiscordUser>()
            .await
            .map_err(|e| StorefrontError::Upstream(format!("invalid identity response: {}", e)))?
            .into();

        self.cache_user(key, user.clone()).await;
        Ok(user)
    }
}
