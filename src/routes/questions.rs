//! Questions for the creator
//!
//! Signed-in users ask; the unlocked admin answers, reopens or hides.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode, Uri};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use super::auth::require_user;
use super::response::{json_response, parse_json, query_params};
use crate::db::schemas::{parse_records, Question, QuestionFilter, QuestionStatus, RemoteRecord};
use crate::db::store::SNAPSHOT_LIMIT;
use crate::db::{CollectionRef, ListQuery};
use crate::server::AppState;
use crate::site::validators::{accept_text, check_caption, CAPTION_LIMIT};
use crate::types::{Result, StorefrontError};

/// Name recorded as `answeredBy`
const ANSWERED_BY: &str = "GhostriderJunior";

#[derive(Debug, Deserialize)]
struct NewQuestion {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    hidden: bool,
}

/// GET /api/questions?filter=all|open|answered&q=
pub async fn handle_list_questions(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Response<Full<Bytes>>> {
    let params = query_params(uri);
    let raw_filter = params.get("filter").map(String::as_str).unwrap_or("all");
    let filter = QuestionFilter::parse(raw_filter)
        .ok_or_else(|| StorefrontError::Validation(format!("unknown filter '{}'", raw_filter)))?;
    let search = params.get("q").map(String::as_str).unwrap_or("");
    let is_admin = state.admin.try_authorize(headers).is_some();

    let collection = CollectionRef::Questions;
    let query = ListQuery::new(collection.default_order()).limit(SNAPSHOT_LIMIT);
    let page = state.store.list(&collection, &query).await?;
    let questions: Vec<Question> = parse_records::<Question>(&page.documents)
        .into_iter()
        .filter(|q| filter.admits(q, is_admin) && q.matches_search(search))
        .collect();

    Ok(json_response(StatusCode::OK, &serde_json::json!({ "questions": questions })))
}

/// POST /api/questions
pub async fn handle_ask(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    let user = require_user(state, headers).await?;
    let request: NewQuestion = parse_json(body)?;
    let text = accept_text(&request.text).ok_or_else(|| {
        StorefrontError::Validation(format!("question must be 1 to {} characters", CAPTION_LIMIT))
    })?;

    let mut fields = Map::new();
    fields.insert("text".into(), Value::from(text));
    fields.insert("userId".into(), Value::from(user.id.clone()));
    fields.insert("userName".into(), Value::from(user.display_name.clone()));
    fields.insert(
        "userAvatar".into(),
        user.avatar_url.clone().map(Value::from).unwrap_or(Value::Null),
    );
    fields.insert("status".into(), Value::from(QuestionStatus::Open.as_str()));
    fields.insert("answer".into(), Value::Null);

    let doc = state.store.create(&CollectionRef::Questions, fields).await?;
    let question = Question::from_document(&doc)
        .map_err(|e| StorefrontError::Database(format!("created question is unreadable: {}", e)))?;
    info!(question_id = %question.id, user_id = %user.id, "Question asked");
    Ok(json_response(StatusCode::CREATED, &question))
}

/// PUT /api/questions/{id}/answer
///
/// `{ "answer": "" }` reopens; `{ "hidden": true }` hides regardless of answer.
pub async fn handle_answer(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let request: AnswerRequest = parse_json(body)?;

    if !request.hidden && !check_caption(request.answer.trim()) {
        return Err(StorefrontError::Validation(format!(
            "answer must be at most {} characters",
            CAPTION_LIMIT
        )));
    }

    let patch = if request.hidden {
        let mut patch = Map::new();
        patch.insert("status".into(), Value::from(QuestionStatus::Hidden.as_str()));
        patch
    } else {
        Question::answer_patch(&request.answer, ANSWERED_BY)
    };

    let doc = state.store.update(&CollectionRef::Questions, id, patch).await?;
    let question = Question::from_document(&doc)
        .map_err(|e| StorefrontError::Database(format!("updated question is unreadable: {}", e)))?;
    info!(question_id = %id, status = question.status.as_str(), "Question updated");
    Ok(json_response(StatusCode::OK, &question))
}

/// DELETE /api/questions/{id}
pub async fn handle_delete_question(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    state.store.delete(&CollectionRef::Questions, id).await?;
    info!(question_id = %id, "Question deleted");
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "deleted": id })))
}
