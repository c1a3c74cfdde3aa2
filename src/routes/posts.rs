//! Feed posts and likes
//!
//! Reads are public; single posts come from the live feed mirror when it
//! holds them. Creating, editing and deleting posts needs an admin token,
//! and edits and deletes are patched into the mirror once the store accepts
//! them. Likes are per visitor: the browser identifies itself with
//! `X-Visitor-Id` and the server keeps that visitor's like ledger.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode, Uri};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::response::{json_response, parse_json, query_params};
use crate::db::schemas::{Post, RemoteRecord};
use crate::db::{CollectionRef, Cursor, ListQuery};
use crate::server::AppState;
use crate::site::likes::{remote_delta, toggle, LikeState};
use crate::site::validators::{accept_text, is_http_url, CAPTION_LIMIT};
use crate::types::{Result, StorefrontError};

/// Header carrying the anonymous visitor id
pub const VISITOR_HEADER: &str = "x-visitor-id";

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPost {
    caption: String,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostPatch {
    #[serde(default)]
    caption: Option<String>,
    /// `Some("")` clears the image
    #[serde(default)]
    image_url: Option<String>,
}

fn validated_caption(caption: &str) -> Result<String> {
    accept_text(caption).map(str::to_string).ok_or_else(|| {
        StorefrontError::Validation(format!(
            "caption must be 1 to {} characters",
            CAPTION_LIMIT
        ))
    })
}

/// Image URL as stored: null when empty, rejected unless http(s).
fn validated_image(image_url: Option<&str>) -> Result<Value> {
    match image_url.map(str::trim).filter(|u| !u.is_empty()) {
        None => Ok(Value::Null),
        Some(url) if is_http_url(url) => Ok(Value::from(url)),
        Some(_) => Err(StorefrontError::Validation("image URL must be http(s)".into())),
    }
}

pub(crate) async fn load_post(state: &AppState, id: &str) -> Result<Post> {
    let doc = state
        .store
        .get(&CollectionRef::Posts, id)
        .await?
        .ok_or_else(|| StorefrontError::NotFound(format!("post {}", id)))?;
    Post::from_document(&doc)
        .map_err(|e| StorefrontError::NotFound(format!("post {} is unreadable: {}", id, e)))
}

/// GET /api/posts?limit=&cursor=
pub async fn handle_list_posts(state: &AppState, uri: &Uri) -> Result<Response<Full<Bytes>>> {
    let params = query_params(uri);
    let limit = match params.get("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| StorefrontError::Validation(format!("invalid limit '{}'", raw)))?
            .clamp(1, MAX_PAGE_SIZE),
        None => DEFAULT_PAGE_SIZE,
    };
    let cursor = params
        .get("cursor")
        .filter(|c| !c.is_empty())
        .map(|c| Cursor::decode(c))
        .transpose()?;

    let collection = CollectionRef::Posts;
    let query = ListQuery::new(collection.default_order())
        .limit(limit)
        .start_after(cursor);
    let page = state.store.list(&collection, &query).await?;
    let posts: Vec<Post> = crate::db::schemas::parse_records(&page.documents);

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "posts": posts,
            "nextCursor": page.next_cursor.map(|c| c.encode()),
        }),
    ))
}

/// GET /api/posts/{id}
pub async fn handle_get_post(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    let post = match state.posts.find(id) {
        Some(post) => post,
        None => load_post(state, id).await?,
    };
    Ok(json_response(StatusCode::OK, &post))
}

/// POST /api/posts
pub async fn handle_create_post(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let request: NewPost = parse_json(body)?;

    let mut fields = Map::new();
    fields.insert("caption".into(), Value::from(validated_caption(&request.caption)?));
    fields.insert("imageUrl".into(), validated_image(request.image_url.as_deref())?);
    fields.insert("likes".into(), Value::from(0));
    fields.insert("commentsCount".into(), Value::from(0));

    let doc = state.store.create(&CollectionRef::Posts, fields).await?;
    let post = Post::from_document(&doc)
        .map_err(|e| StorefrontError::Database(format!("created post is unreadable: {}", e)))?;
    info!(post_id = %post.id, "Post published");
    Ok(json_response(StatusCode::CREATED, &post))
}

/// PATCH /api/posts/{id}
pub async fn handle_update_post(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let request: PostPatch = parse_json(body)?;

    let mut fields = Map::new();
    if let Some(caption) = &request.caption {
        fields.insert("caption".into(), Value::from(validated_caption(caption)?));
    }
    if request.image_url.is_some() {
        fields.insert("imageUrl".into(), validated_image(request.image_url.as_deref())?);
    }
    if fields.is_empty() {
        return Err(StorefrontError::Validation("nothing to update".into()));
    }

    let remote = state.store.update(&CollectionRef::Posts, id, fields);
    let doc = state
        .posts
        .mutate(remote, |posts, doc| {
            let slot = posts.iter_mut().find(|p| p.id == id);
            if let (Some(slot), Ok(updated)) = (slot, Post::from_document(doc)) {
                *slot = updated;
            }
        })
        .await?;
    let post = Post::from_document(&doc)
        .map_err(|e| StorefrontError::Database(format!("updated post is unreadable: {}", e)))?;
    info!(post_id = %id, "Post edited");
    Ok(json_response(StatusCode::OK, &post))
}

/// DELETE /api/posts/{id}
pub async fn handle_delete_post(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let remote = state.store.delete(&CollectionRef::Posts, id);
    state
        .posts
        .mutate(remote, |posts, _| posts.retain(|p| p.id != id))
        .await?;
    info!(post_id = %id, "Post deleted");
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "deleted": id })))
}

fn visitor_id(headers: &HeaderMap) -> Result<String> {
    headers
        .get(VISITOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .ok_or_else(|| StorefrontError::Validation("X-Visitor-Id header is required".into()))
}

/// POST /api/posts/{id}/like
///
/// Flips the visitor's like. The remote counter moves first; the visitor's
/// ledger and the mirrored post only change once that succeeded.
pub async fn handle_toggle_like(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response<Full<Bytes>>> {
    let visitor = visitor_id(headers)?;
    let prev = state.visitors.load(&visitor).state(id);
    let next = toggle(prev.liked, prev.count);

    let remote = state
        .store
        .increment(&CollectionRef::Posts, id, "likes", remote_delta(prev.liked));
    let likes = state
        .posts
        .mutate(remote, |posts, likes| {
            if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
                post.likes = (*likes).max(0) as u64;
            }
        })
        .await?;

    let state_now = LikeState {
        liked: next.liked,
        count: likes.max(0) as u64,
    };
    state.visitors.record(&visitor, id, state_now);
    debug!(post_id = %id, liked = state_now.liked, likes = state_now.count, "Like toggled");

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "postId": id,
            "liked": state_now.liked,
            "likes": state_now.count,
        }),
    ))
}
