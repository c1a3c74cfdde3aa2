//! Site changelog with per-day date chips

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode, Uri};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use super::response::{json_response, parse_json, query_params};
use crate::db::schemas::{date_chips, parse_items, parse_records, select_entries, ChangelogEntry, DateKey, RemoteRecord};
use crate::db::store::{server_timestamp, SNAPSHOT_LIMIT};
use crate::db::{CollectionRef, ListQuery};
use crate::server::AppState;
use crate::types::{Result, StorefrontError};

#[derive(Debug, Deserialize)]
struct EntryRequest {
    title: String,
    /// One change per line, optionally numbered
    changes: String,
    #[serde(default)]
    note: Option<String>,
}

impl EntryRequest {
    fn into_fields(self) -> Result<Map<String, Value>> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StorefrontError::Validation("title is required".into()));
        }
        let items = parse_items(&self.changes);
        if items.is_empty() {
            return Err(StorefrontError::Validation("at least one change is required".into()));
        }
        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(Value::from)
            .unwrap_or(Value::Null);

        let mut fields = Map::new();
        fields.insert("title".into(), Value::from(title));
        fields.insert("items".into(), Value::from(items));
        fields.insert("note".into(), note);
        Ok(fields)
    }
}

fn parse_entry(doc: &crate::db::StoredDocument) -> Result<ChangelogEntry> {
    ChangelogEntry::from_document(doc)
        .map_err(|e| StorefrontError::Database(format!("changelog entry is unreadable: {}", e)))
}

/// GET /api/changelog?date=latest|YYYY.MM.DD
pub async fn handle_changelog(state: &AppState, uri: &Uri) -> Result<Response<Full<Bytes>>> {
    let params = query_params(uri);
    let key = DateKey::parse(params.get("date").map(String::as_str).unwrap_or(""));

    let collection = CollectionRef::Changelog;
    let query = ListQuery::new(collection.default_order()).limit(SNAPSHOT_LIMIT);
    let page = state.store.list(&collection, &query).await?;
    let entries: Vec<ChangelogEntry> = parse_records(&page.documents);

    let selected = match &key {
        DateKey::Latest => "latest".to_string(),
        DateKey::Day(day) => day.clone(),
    };
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "dates": date_chips(&entries),
            "selected": selected,
            "entries": select_entries(&entries, &key),
        }),
    ))
}

/// POST /api/changelog
pub async fn handle_create_entry(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let request: EntryRequest = parse_json(body)?;
    let mut fields = request.into_fields()?;
    fields.insert("date".into(), Value::from(server_timestamp()));

    let doc = state.store.create(&CollectionRef::Changelog, fields).await?;
    let entry = parse_entry(&doc)?;
    info!(entry_id = %entry.id, items = entry.items.len(), "Changelog entry added");
    Ok(json_response(StatusCode::CREATED, &entry))
}

/// PUT /api/changelog/{id}
pub async fn handle_update_entry(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    let request: EntryRequest = parse_json(body)?;
    let doc = state
        .store
        .update(&CollectionRef::Changelog, id, request.into_fields()?)
        .await?;
    let entry = parse_entry(&doc)?;
    info!(entry_id = %id, "Changelog entry edited");
    Ok(json_response(StatusCode::OK, &entry))
}

/// DELETE /api/changelog/{id}
pub async fn handle_delete_entry(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response<Full<Bytes>>> {
    state.admin.authorize(headers)?;
    state.store.delete(&CollectionRef::Changelog, id).await?;
    info!(entry_id = %id, "Changelog entry deleted");
    Ok(json_response(StatusCode::OK, &serde_json::json!({ "deleted": id })))
}
