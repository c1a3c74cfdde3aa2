//! Persistence: the document store seam, its backends and typed records

pub mod feed;
pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use feed::{spawn_feed_refresh_task, FeedHub, FeedState};
pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoStore};
pub use store::{CollectionRef, Cursor, DocumentStore, ListQuery, Order, Page, StoredDocument};
