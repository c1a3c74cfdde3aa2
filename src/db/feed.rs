//! Snapshot channels for live collection feeds
//!
//! One `watch` channel per watched collection. Receivers always see the
//! latest full snapshot; intermediate snapshots may be coalesced.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use super::store::{CollectionRef, DocumentStore, StoredDocument};

/// Latest state of a collection feed.
#[derive(Debug, Clone, Default)]
pub enum FeedState {
    /// Initial load has not completed
    #[default]
    Pending,
    /// Full ordered snapshot
    Ready(Arc<Vec<StoredDocument>>),
    /// The backend failed to produce a snapshot
    Failed(String),
}

#[derive(Default)]
pub struct FeedHub {
    channels: DashMap<CollectionRef, watch::Sender<FeedState>>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receiver for `collection`, and whether the channel was just created.
    ///
    /// A channel whose receivers have all dropped is reset so the next
    /// subscriber triggers a fresh load.
    pub fn subscribe(&self, collection: &CollectionRef) -> (watch::Receiver<FeedState>, bool) {
        let mut fresh = false;
        let entry = self
            .channels
            .entry(collection.clone())
            .and_modify(|tx| {
                if tx.receiver_count() == 0 {
                    tx.send_replace(FeedState::Pending);
                    fresh = true;
                }
            })
            .or_insert_with(|| {
                fresh = true;
                watch::channel(FeedState::Pending).0
            });
        (entry.subscribe(), fresh)
    }

    pub fn is_watched(&self, collection: &CollectionRef) -> bool {
        self.channels
            .get(collection)
            .map(|tx| tx.receiver_count() > 0)
            .unwrap_or(false)
    }

    /// Replace the current state. Receivers are not woken when the new
    /// state equals the current one.
    pub fn publish(&self, collection: &CollectionRef, state: FeedState) {
        if let Some(tx) = self.channels.get(collection) {
            tx.send_if_modified(|current| {
                let same = match (&*current, &state) {
                    (FeedState::Ready(a), FeedState::Ready(b)) => a == b,
                    (FeedState::Failed(a), FeedState::Failed(b)) => a == b,
                    _ => false,
                };
                if !same {
                    *current = state;
                }
                !same
            });
        }
    }

    /// Collections with at least one live receiver.
    pub fn watched(&self) -> Vec<CollectionRef> {
        self.channels
            .iter()
            .filter(|e| e.value().receiver_count() > 0)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Drop channels nobody listens to any more.
    pub fn prune(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

/// Periodically reload every watched collection.
///
/// Picks up writes made outside this process (other instances, the
/// database console) which the store's own mutations never announce.
pub fn spawn_feed_refresh_task(store: Arc<dyn DocumentStore>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let watched = store.feed().watched();
            for collection in &watched {
                store.refresh(collection).await;
            }
            store.feed().prune();
            debug!(collections = watched.len(), "Feed refresh completed");
        }
    });

    info!(interval_secs = interval.as_secs(), "Feed refresh task started");
}
