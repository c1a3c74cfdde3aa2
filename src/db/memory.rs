//! In-process document store for dev mode and tests

use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::feed::FeedHub;
use super::store::{
    server_timestamp, strip_reserved, CollectionRef, DocumentStore, ListQuery, Page, StoredDocument,
    CREATED_AT, UPDATED_AT,
};
use crate::types::{Result, StorefrontError};

/// Documents keyed by collection path, then by id.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<String, StoredDocument>>,
    feed: FeedHub,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(collection: &CollectionRef, id: &str) -> StorefrontError {
        StorefrontError::NotFound(format!("{} {}", collection.name(), id))
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn feed(&self) -> &FeedHub {
        &self.feed
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, collection: &CollectionRef, mut fields: Map<String, Value>) -> Result<StoredDocument> {
        strip_reserved(&mut fields);
        let now = server_timestamp();
        fields.insert(CREATED_AT.into(), Value::from(now));
        fields.insert(UPDATED_AT.into(), Value::from(now));
        if let CollectionRef::Comments { post_id } = collection {
            fields.insert("postId".into(), Value::from(post_id.as_str()));
        }

        let doc = StoredDocument {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        self.collections
            .entry(collection.path())
            .or_default()
            .insert(doc.id.clone(), doc.clone());

        debug!(collection = %collection.path(), id = %doc.id, "Created document");
        self.refresh(collection).await;
        Ok(doc)
    }

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<StoredDocument>> {
        Ok(self
            .collections
            .get(&collection.path())
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<StoredDocument> {
        strip_reserved(&mut fields);
        let updated = {
            let mut docs = self
                .collections
                .get_mut(&collection.path())
                .ok_or_else(|| Self::not_found(collection, id))?;
            let doc = docs.get_mut(id).ok_or_else(|| Self::not_found(collection, id))?;
            doc.fields.extend(fields);
            doc.fields.insert(UPDATED_AT.into(), Value::from(server_timestamp()));
            doc.clone()
        };
        self.refresh(collection).await;
        Ok(updated)
    }

    async fn delete(&self, collection: &CollectionRef, id: &str) -> Result<()> {
        let removed = self
            .collections
            .get_mut(&collection.path())
            .and_then(|mut docs| docs.remove(id));
        if removed.is_none() {
            return Err(Self::not_found(collection, id));
        }
        self.refresh(collection).await;
        Ok(())
    }

    async fn list(&self, collection: &CollectionRef, query: &ListQuery) -> Result<Page> {
        let mut docs: Vec<StoredDocument> = self
            .collections
            .get(&collection.path())
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();

        docs.sort_by(|a, b| query.order.compare(a, b));
        if let Some(cursor) = &query.start_after {
            docs.retain(|d| query.order.is_after(d, cursor));
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit + 1);
        }
        Ok(Page::from_overfetch(docs, query))
    }

    async fn increment(&self, collection: &CollectionRef, id: &str, field: &str, delta: i64) -> Result<i64> {
        let value = {
            let mut docs = self
                .collections
                .get_mut(&collection.path())
                .ok_or_else(|| Self::not_found(collection, id))?;
            let doc = docs.get_mut(id).ok_or_else(|| Self::not_found(collection, id))?;
            let value = doc.get_i64(field).unwrap_or(0) + delta;
            doc.fields.insert(field.to_string(), Value::from(value));
            value
        };
        self.refresh(collection).await;
        Ok(value)
    }
}
