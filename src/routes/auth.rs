//! Signed-in visitors and the admin unlock

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Deserialize;

use super::response::{json_response, parse_json};
use crate::auth::bearer_token;
use crate::server::AppState;
use crate::services::AuthUser;
use crate::types::{Result, StorefrontError};

/// Resolve the bearer token to a user or fail with 401.
pub(crate) async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser> {
    let token = bearer_token(headers)
        .ok_or_else(|| StorefrontError::Unauthorized("sign in first".into()))?;
    state.identity.resolve(token).await
}

/// GET /api/auth/me
pub async fn handle_me(state: &AppState, headers: &HeaderMap) -> Result<Response<Full<Bytes>>> {
    let user = require_user(state, headers).await?;
    Ok(json_response(StatusCode::OK, &user))
}

#[derive(Debug, Deserialize)]
struct UnlockRequest {
    password: String,
}

/// POST /api/admin/unlock
pub fn handle_unlock(state: &AppState, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let request: UnlockRequest = parse_json(body)?;
    let session = state.admin.unlock(&request.password)?;
    Ok(json_response(StatusCode::OK, &session))
}

/// POST /api/admin/lock
pub fn handle_lock(state: &AppState, headers: &HeaderMap) -> Result<Response<Full<Bytes>>> {
    let capability = state.admin.authorize(headers)?;
    state.admin.lock(capability);
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "locked": true })))
}
