//! Comments under a post, oldest first
//!
//! Posting needs a signed-in user. The post's `commentsCount` moves with
//! every comment added or removed. A comment whose counter update fails is
//! withdrawn before the error is returned; a failed decrement after a
//! delete is only logged.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::auth::require_user;
use super::posts::load_post;
use super::response::{json_response, parse_json};
use crate::db::schemas::{parse_records, Comment, RemoteRecord};
use crate::db::store::SNAPSHOT_LIMIT;
use crate::db::{CollectionRef, ListQuery};
use crate::server::AppState;
use crate::site::validators::{accept_text, CAPTION_LIMIT};
use crate::types::{Result, StorefrontError};

#[derive(Debug, Deserialize)]
struct NewComment {
    text: String,
}

fn comments_of(post_id: &str) -> CollectionRef {
    CollectionRef::Comments {
        post_id: post_id.to_string(),
    }
}

/// Move the post's comment counter and the mirrored copy with it.
async fn bump_comment_count(state: &AppState, post_id: &str, delta: i64) -> Result<i64> {
    let remote = state
        .store
        .increment(&CollectionRef::Posts, post_id, "commentsCount", delta);
    state
        .posts
        .mutate(remote, |posts, count| {
            if let Some(post) = posts.iter_mut().find(|p| p.id == post_id) {
                post.comments_count = (*count).max(0) as u64;
            }
        })
        .await
}

/// GET /api/posts/{id}/comments
pub async fn handle_list_comments(state: &AppState, post_id: &str) -> Result<Response<Full<Bytes>>> {
    load_post(state, post_id).await?;
    let collection = comments_of(post_id);
    let query = ListQuery::new(collection.default_order()).limit(SNAPSHOT_LIMIT);
    let page = state.store.list(&collection, &query).await?;
    let comments: Vec<Comment> = parse_records(&page.documents);
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "comments": comments })))
}

/// POST /api/posts/{id}/comments
pub async fn handle_create_comment(
    state: &AppState,
    headers: &HeaderMap,
    post_id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    let user = require_user(state, headers).await?;
    let request: NewComment = parse_json(body)?;
    let text = accept_text(&request.text).ok_or_else(|| {
        StorefrontError::Validation(format!("comment must be 1 to {} characters", CAPTION_LIMIT))
    })?;
    load_post(state, post_id).await?;

    let mut fields = Map::new();
    fields.insert("text".into(), Value::from(text));
    fields.insert("userId".into(), Value::from(user.id.clone()));
    fields.insert("userName".into(), Value::from(user.display_name.clone()));
    fields.insert(
        "userAvatar".into(),
        user.avatar_url.clone().map(Value::from).unwrap_or(Value::Null),
    );

    let collection = comments_of(post_id);
    let doc = state.store.create(&collection, fields).await?;
    let comment = Comment::from_document(&doc)
        .map_err(|e| StorefrontError::Database(format!("created comment is unreadable: {}", e)))?;
    let count = match bump_comment_count(state, post_id, 1).await {
        Ok(count) => count,
        Err(e) => {
            warn!(post_id, comment_id = %comment.id, error = %e, "Comment counter not updated; withdrawing comment");
            if let Err(undo) = state.store.delete(&collection, &comment.id).await {
                error!(post_id, comment_id = %comment.id, error = %undo, "Failed to withdraw comment");
            }
            return Err(e);
        }
    };
    info!(post_id, comment_id = %comment.id, user_id = %user.id, count, "Comment added");

    Ok(json_response(StatusCode::CREATED, &comment))
}

/// DELETE /api/posts/{id}/comments/{cid}
///
/// Allowed for the comment's author or an unlocked admin.
pub async fn handle_delete_comment(
    state: &AppState,
    headers: &HeaderMap,
    post_id: &str,
    comment_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let collection = comments_of(post_id);
    let doc = state
        .store
        .get(&collection, comment_id)
        .await?
        .ok_or_else(|| StorefrontError::NotFound(format!("comment {}", comment_id)))?;

    if state.admin.try_authorize(headers).is_none() {
        let user = require_user(state, headers).await?;
        let author = doc.get_str("userId").unwrap_or_default();
        if author != user.id {
            return Err(StorefrontError::Forbidden("only the author can delete this comment".into()));
        }
    }

    state.store.delete(&collection, comment_id).await?;
    if let Err(e) = bump_comment_count(state, post_id, -1).await {
        warn!(post_id, error = %e, "Comment removed but counter not updated");
    }
    info!(post_id, comment_id, "Comment deleted");
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "deleted": comment_id })))
}
