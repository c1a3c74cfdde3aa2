//! Admin unlock sessions
//!
//! Unlocking exchanges the admin secret for a short-lived HS256 token.
//! Content-mutating handlers demand an [`AdminCapability`], which only
//! [`AdminGate::authorize`] can produce from a valid, unrevoked token.

use dashmap::DashMap;
use hyper::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::password::verify_secret;
use crate::types::{Result, StorefrontError};

/// Header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const ISSUER: &str = "storefront";
const SUBJECT: &str = "admin";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    jti: String,
    iat: i64,
    exp: i64,
}

/// Issued on unlock
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub token: String,
    /// Seconds since epoch
    pub expires_at: i64,
}

/// Proof that the current request carries a valid admin token.
#[derive(Debug, Clone)]
pub struct AdminCapability {
    session_id: String,
    expires_at: i64,
}

impl AdminCapability {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

pub struct AdminGate {
    secret: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    /// Revoked session ids with their expiry
    revoked: DashMap<String, i64>,
}

impl AdminGate {
    /// `secret` is the resolved admin secret; empty disables unlocking.
    pub fn new(secret: String, signing_key: &[u8], session_ttl: Duration) -> Self {
        Self {
            secret,
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            session_ttl,
            revoked: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Exchange the admin secret for a session token.
    pub fn unlock(&self, candidate: &str) -> Result<AdminSession> {
        if !self.is_enabled() {
            return Err(StorefrontError::Forbidden("admin unlock is not configured".into()));
        }
        if !verify_secret(candidate, &self.secret)? {
            warn!("Admin unlock rejected");
            return Err(StorefrontError::Unauthorized("wrong admin password".into()));
        }

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: SUBJECT.to_string(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.session_ttl.as_secs() as i64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| StorefrontError::Config(format!("Failed to sign admin token: {e}")))?;

        info!(session = %claims.jti, expires_at = claims.exp, "Admin unlocked");
        Ok(AdminSession {
            token,
            expires_at: claims.exp,
        })
    }

    /// Validate a raw token.
    pub fn verify(&self, token: &str) -> Result<AdminCapability> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.sub = Some(SUBJECT.to_string());

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "Admin token rejected");
            StorefrontError::Unauthorized("invalid or expired admin token".into())
        })?;

        if self.revoked.contains_key(&data.claims.jti) {
            return Err(StorefrontError::Unauthorized("admin session was locked".into()));
        }
        Ok(AdminCapability {
            session_id: data.claims.jti,
            expires_at: data.claims.exp,
        })
    }

    /// Capability from the request's admin token header.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<AdminCapability> {
        let token = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorefrontError::Unauthorized("admin token required".into()))?;
        self.verify(token)
    }

    /// Like [`authorize`](Self::authorize) but absent or bad tokens are just "not admin".
    pub fn try_authorize(&self, headers: &HeaderMap) -> Option<AdminCapability> {
        self.authorize(headers).ok()
    }

    /// Revoke the session behind `capability`.
    pub fn lock(&self, capability: AdminCapability) {
        let now = chrono::Utc::now().timestamp();
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(capability.session_id.clone(), capability.expires_at);
        info!(session = %capability.session_id, "Admin locked");
    }
}
