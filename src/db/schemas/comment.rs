//! Comments, stored per post and read oldest first

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::Serialize;

use super::{optional_millis, optional_str, required_str, RemoteRecord, SchemaError};
use crate::db::mongo::IntoIndexes;
use crate::db::store::{StoredDocument, CREATED_AT};

/// A signed-in user's comment on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub created_at: i64,
}

impl RemoteRecord for Comment {
    fn from_document(doc: &StoredDocument) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id.clone(),
            post_id: required_str(doc, "postId")?,
            text: required_str(doc, "text")?,
            user_id: required_str(doc, "userId")?,
            user_name: optional_str(doc, "userName")?.unwrap_or_else(|| "anonymous".to_string()),
            user_avatar: optional_str(doc, "userAvatar")?,
            created_at: optional_millis(doc, CREATED_AT)?.unwrap_or(0),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for Comment {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "postId": 1, "createdAt": 1 },
            Some(IndexOptions::builder().name("post_created_at".to_string()).build()),
        )]
    }
}
