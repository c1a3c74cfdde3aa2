//! Typed records for the site's collections
//!
//! Stored documents are untrusted: anything can write to the database.
//! Each record type validates a [`StoredDocument`] on the way in, and
//! [`parse_records`] drops documents that fail with a warning instead of
//! failing the whole snapshot.

mod changelog;
mod comment;
mod post;
mod question;

pub use changelog::{date_chip, date_chips, parse_items, select_entries, ChangelogEntry, DateKey};
pub use comment::Comment;
pub use post::Post;
pub use question::{Question, QuestionFilter, QuestionStatus};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::store::StoredDocument;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' has the wrong type")]
    InvalidField(&'static str),
}

/// A record parsed from a stored document.
pub trait RemoteRecord: Sized + Clone + Serialize + Send + Sync + 'static {
    fn from_document(doc: &StoredDocument) -> Result<Self, SchemaError>;

    fn id(&self) -> &str;
}

/// Parse every valid document, skipping and logging invalid ones.
pub fn parse_records<T: RemoteRecord>(docs: &[StoredDocument]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match T::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping invalid record");
                None
            }
        })
        .collect()
}

// Field readers shared by the record types

fn required_str(doc: &StoredDocument, field: &'static str) -> Result<String, SchemaError> {
    match doc.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(SchemaError::MissingField(field)),
        Some(_) => Err(SchemaError::InvalidField(field)),
    }
}

/// Optional string; null and empty read as absent.
fn optional_str(doc: &StoredDocument, field: &'static str) -> Result<Option<String>, SchemaError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::InvalidField(field)),
    }
}

fn optional_millis(doc: &StoredDocument, field: &'static str) -> Result<Option<i64>, SchemaError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => doc
            .get_i64(field)
            .map(Some)
            .ok_or(SchemaError::InvalidField(field)),
    }
}

/// Non-negative counter; missing is 0, negative clamps to 0.
fn counter(doc: &StoredDocument, field: &'static str) -> Result<u64, SchemaError> {
    match optional_millis(doc, field)? {
        Some(v) => Ok(v.max(0) as u64),
        None => Ok(0),
    }
}

#[cfg(test)]
pub(crate) fn test_doc(id: &str, value: Value) -> StoredDocument {
    StoredDocument {
        id: id.to_string(),
        fields: match value {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_records_skips_invalid() {
        let docs = vec![
            test_doc("ok", json!({"caption": "fine", "createdAt": 2})),
            test_doc("bad", json!({"caption": 42})),
            test_doc("missing", json!({"createdAt": 1})),
        ];
        let posts: Vec<Post> = parse_records(&docs);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "ok");
    }

    #[test]
    fn test_counter_clamps() {
        let doc = test_doc("p", json!({"likes": -3, "other": 5}));
        assert_eq!(counter(&doc, "likes").unwrap(), 0);
        assert_eq!(counter(&doc, "other").unwrap(), 5);
        assert_eq!(counter(&doc, "absent").unwrap(), 0);
    }

    #[test]
    fn test_optional_str() {
        let doc = test_doc("p", json!({"a": "", "b": null, "c": "x", "d": 1}));
        assert_eq!(optional_str(&doc, "a").unwrap(), None);
        assert_eq!(optional_str(&doc, "b").unwrap(), None);
        assert_eq!(optional_str(&doc, "c").unwrap().as_deref(), Some("x"));
        assert_eq!(optional_str(&doc, "d"), Err(SchemaError::InvalidField("d")));
    }
}
