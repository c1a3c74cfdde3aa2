//! Feed post record

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::Serialize;

use super::{counter, optional_millis, optional_str, required_str, RemoteRecord, SchemaError};
use crate::db::mongo::IntoIndexes;
use crate::db::store::{StoredDocument, CREATED_AT, UPDATED_AT};
use crate::site::validators::is_http_url;

/// A post in the "What's Coming" feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub caption: String,
    /// Only http(s) URLs survive parsing
    pub image_url: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub likes: u64,
    pub comments_count: u64,
}

impl RemoteRecord for Post {
    fn from_document(doc: &StoredDocument) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id.clone(),
            caption: required_str(doc, "caption")?,
            image_url: optional_str(doc, "imageUrl")?.filter(|u| is_http_url(u)),
            created_at: optional_millis(doc, CREATED_AT)?.unwrap_or(0),
            updated_at: optional_millis(doc, UPDATED_AT)?,
            likes: counter(doc, "likes")?,
            comments_count: counter(doc, "commentsCount")?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for Post {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "createdAt": -1, "_id": -1 },
            Some(IndexOptions::builder().name("created_at_desc".to_string()).build()),
        )]
    }
}
