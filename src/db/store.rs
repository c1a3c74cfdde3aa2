//! Document store abstraction
//!
//! The site keeps its content in four ordered collections. Handlers and the
//! live feed only see [`DocumentStore`]; MongoDB backs it in production and
//! [`MemoryStore`](super::MemoryStore) in dev mode and tests.
//!
//! Documents are schemaless JSON objects at this layer. Typed parsing and
//! validation happen in [`schemas`](super::schemas).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::feed::{FeedHub, FeedState};
use crate::types::{Result, StorefrontError};

/// Field holding the server-assigned creation time (millis since epoch).
pub const CREATED_AT: &str = "createdAt";
/// Field holding the server-assigned last update time.
pub const UPDATED_AT: &str = "updatedAt";
/// Most documents a live snapshot carries.
pub const SNAPSHOT_LIMIT: usize = 500;

/// Current server time in millis.
pub fn server_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Collections and ordering
// ============================================================================

/// One of the site's ordered collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    Posts,
    /// Comments under a single post
    Comments { post_id: String },
    Questions,
    Changelog,
}

impl CollectionRef {
    /// Backing collection name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Comments { .. } => "comments",
            Self::Questions => "questions",
            Self::Changelog => "changelog",
        }
    }

    /// Path form used by feed subscriptions (`posts/{id}/comments` for comments)
    pub fn path(&self) -> String {
        match self {
            Self::Comments { post_id } => format!("posts/{}/comments", post_id),
            other => other.name().to_string(),
        }
    }

    /// Parse the path form back.
    pub fn from_path(path: &str) -> Option<Self> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["posts"] => Some(Self::Posts),
            ["questions"] => Some(Self::Questions),
            ["changelog"] => Some(Self::Changelog),
            ["posts", id, "comments"] if !id.is_empty() => Some(Self::Comments {
                post_id: (*id).to_string(),
            }),
            _ => None,
        }
    }

    /// Order the site displays this collection in.
    pub fn default_order(&self) -> Order {
        match self {
            Self::Posts | Self::Questions => Order::desc(CREATED_AT),
            Self::Comments { .. } => Order::asc(CREATED_AT),
            Self::Changelog => Order::desc("date"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort on one numeric field, ties broken by document id in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }

    /// Compare two documents under this order.
    pub fn compare(&self, a: &StoredDocument, b: &StoredDocument) -> Ordering {
        let ord = a
            .sort_key(&self.field)
            .cmp(&b.sort_key(&self.field))
            .then_with(|| a.id.cmp(&b.id));
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    /// Whether `doc` sorts strictly after the cursor position.
    pub fn is_after(&self, doc: &StoredDocument, cursor: &Cursor) -> bool {
        let ord = (doc.sort_key(&self.field), doc.id.as_str())
            .cmp(&(cursor.sort_value, cursor.id.as_str()));
        match self.direction {
            Direction::Asc => ord == Ordering::Greater,
            Direction::Desc => ord == Ordering::Less,
        }
    }
}

// ============================================================================
// Documents, cursors and pages
// ============================================================================

/// A stored document: its id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl StoredDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
        })
    }

    /// Numeric sort value; missing fields sort as 0.
    pub fn sort_key(&self, field: &str) -> i64 {
        self.get_i64(field).unwrap_or(0)
    }

    /// Cursor pointing at this document under `order`.
    pub fn cursor(&self, order: &Order) -> Cursor {
        Cursor {
            sort_value: self.sort_key(&order.field),
            id: self.id.clone(),
        }
    }
}

/// Position after which a page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub sort_value: i64,
    pub id: String,
}

impl Cursor {
    /// Opaque URL-safe token.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.sort_value, self.id))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || StorefrontError::Validation("invalid cursor".into());
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let raw = String::from_utf8(raw).map_err(|_| invalid())?;
        let (value, id) = raw.split_once(':').ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            sort_value: value.parse().map_err(|_| invalid())?,
            id: id.to_string(),
        })
    }
}

/// Ordered, optionally paged query.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub order: Order,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl ListQuery {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            limit: None,
            start_after: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }
}

/// One page of a list query.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<StoredDocument>,
    /// Present when the page was full; more documents may follow.
    pub next_cursor: Option<Cursor>,
}

impl Page {
    /// Build a page from up to `limit + 1` fetched documents.
    pub fn from_overfetch(mut documents: Vec<StoredDocument>, query: &ListQuery) -> Self {
        let next_cursor = match query.limit {
            Some(limit) if documents.len() > limit => {
                documents.truncate(limit);
                documents.last().map(|d| d.cursor(&query.order))
            }
            _ => None,
        };
        Self {
            documents,
            next_cursor,
        }
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Document database seam.
///
/// Mutations set server timestamps and republish the live snapshot of the
/// collection they touched.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for health output
    fn kind(&self) -> &'static str;

    /// Live snapshot channels
    fn feed(&self) -> &FeedHub;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Insert a new document with a generated id and `createdAt`/`updatedAt`.
    async fn create(&self, collection: &CollectionRef, fields: Map<String, Value>) -> Result<StoredDocument>;

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<StoredDocument>>;

    /// Merge `fields` into an existing document and bump `updatedAt`.
    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument>;

    async fn delete(&self, collection: &CollectionRef, id: &str) -> Result<()>;

    async fn list(&self, collection: &CollectionRef, query: &ListQuery) -> Result<Page>;

    /// Atomically add `delta` to a numeric field (missing counts as 0) and
    /// return the new value.
    async fn increment(&self, collection: &CollectionRef, id: &str, field: &str, delta: i64) -> Result<i64>;

    /// Subscribe to full snapshots of `collection` in its default order.
    ///
    /// The first subscriber triggers an initial load.
    async fn watch(&self, collection: &CollectionRef) -> watch::Receiver<FeedState> {
        let (rx, fresh) = self.feed().subscribe(collection);
        if fresh {
            self.refresh(collection).await;
        }
        rx
    }

    /// Reload and republish the snapshot of `collection` if anyone watches it.
    async fn refresh(&self, collection: &CollectionRef) {
        if !self.feed().is_watched(collection) {
            return;
        }
        let query = ListQuery::new(collection.default_order()).limit(SNAPSHOT_LIMIT);
        let state = match self.list(collection, &query).await {
            Ok(page) => {
                debug!(collection = %collection.path(), count = page.documents.len(), "Publishing snapshot");
                FeedState::Ready(Arc::new(page.documents))
            }
            Err(e) => {
                warn!(collection = %collection.path(), error = %e, "Snapshot load failed");
                FeedState::Failed(e.to_string())
            }
        };
        self.feed().publish(collection, state);
    }
}

/// Reject patches that try to overwrite store-managed fields.
pub(crate) fn strip_reserved(fields: &mut Map<String, Value>) {
    for key in ["id", "_id", "metadata", CREATED_AT, UPDATED_AT] {
        fields.remove(key);
    }
}
