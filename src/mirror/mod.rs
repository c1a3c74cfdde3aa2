//! Local mirrors of remote ordered collections
//!
//! [`subscribe`] delivers every snapshot of a collection as typed records
//! until the returned [`Subscription`] is dropped. [`ListMirror`] keeps the
//! latest snapshot in memory and applies local patches only after the
//! remote write they mirror has succeeded.
//!
//! A failed snapshot stalls the subscription: the error is logged, the
//! last good list stays in place, and nothing retries.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::db::schemas::{parse_records, RemoteRecord};
use crate::db::{CollectionRef, DocumentStore, FeedState, Order};
use crate::types::Result;

/// Handle to a live collection subscription. Dropping it cancels delivery.
pub struct Subscription {
    handle: JoinHandle<()>,
    stalled: Arc<AtomicBool>,
}

impl Subscription {
    /// Stop delivery. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    /// Whether the feed reported an error and stopped delivering.
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    /// Whether the delivery task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Deliver full snapshots of `collection`, sorted by `order`, to `on_change`.
///
/// Snapshots may be coalesced; `on_change` always receives the latest one.
pub fn subscribe<T, F>(
    store: Arc<dyn DocumentStore>,
    collection: CollectionRef,
    order: Order,
    mut on_change: F,
) -> Subscription
where
    T: RemoteRecord,
    F: FnMut(Vec<T>) + Send + 'static,
{
    let stalled = Arc::new(AtomicBool::new(false));
    let flag = stalled.clone();

    let handle = tokio::spawn(async move {
        let mut rx = store.watch(&collection).await;
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                FeedState::Pending => {}
                FeedState::Ready(docs) => {
                    let mut docs = docs.as_ref().clone();
                    docs.sort_by(|a, b| order.compare(a, b));
                    let records: Vec<T> = parse_records(&docs);
                    debug!(collection = %collection.path(), count = records.len(), "Snapshot delivered");
                    on_change(records);
                }
                FeedState::Failed(e) => {
                    error!(collection = %collection.path(), error = %e, "Subscription failed; mirror stalled");
                    flag.store(true, Ordering::Release);
                    return;
                }
            }
            if rx.changed().await.is_err() {
                debug!(collection = %collection.path(), "Feed closed");
                return;
            }
        }
    });

    Subscription { handle, stalled }
}

/// In-memory copy of a remote collection.
pub struct ListMirror<T> {
    items: Arc<RwLock<Vec<T>>>,
    subscription: Option<Subscription>,
}

impl<T: RemoteRecord> ListMirror<T> {
    /// A mirror not bound to any feed; only local patches change it.
    pub fn detached() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            subscription: None,
        }
    }

    /// Mirror `collection` in its default order.
    pub fn attach(store: Arc<dyn DocumentStore>, collection: CollectionRef) -> Self {
        let items = Arc::new(RwLock::new(Vec::new()));
        let sink = items.clone();
        let order = collection.default_order();
        let subscription = subscribe(store, collection, order, move |records: Vec<T>| {
            let mut guard = sink.write().unwrap_or_else(|e| e.into_inner());
            *guard = records;
        });
        Self {
            items,
            subscription: Some(subscription),
        }
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, id: &str) -> Option<T> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stalled(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_stalled)
    }

    /// Run a remote mutation, then patch the local list with its result.
    ///
    /// When the remote call fails the local list is left untouched and the
    /// error is returned.
    pub async fn mutate<R, Fut, P>(&self, remote: Fut, patch: P) -> Result<R>
    where
        Fut: Future<Output = Result<R>>,
        P: FnOnce(&mut Vec<T>, &R),
    {
        let value = remote.await?;
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        patch(&mut items, &value);
        Ok(value)
    }

    /// Stop following the remote feed, keeping the current list.
    pub fn detach(&mut self) {
        self.subscription = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Post;
    use crate::db::MemoryStore;
    use crate::types::StorefrontError;
    use serde_json::json;
    use std::time::Duration;

    fn caption(text: &str) -> serde_json::Map<String, serde_json::Value> {
        match json!({ "caption": text, "likes": 0 }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_mutate_failure_leaves_list_untouched() {
        let mirror: ListMirror<Post> = ListMirror::detached();
        let result: Result<i64> = mirror
            .mutate(
                async { Err(StorefrontError::Upstream("down".into())) },
                |items: &mut Vec<Post>, _| items.clear(),
            )
            .await;
        assert!(result.is_err());
        assert!(mirror.is_empty());
        assert!(!mirror.is_stalled());
    }

    #[tokio::test]
    async fn test_attach_follows_store() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mirror: ListMirror<Post> = ListMirror::attach(store.clone(), CollectionRef::Posts);

        let first = store.create(&CollectionRef::Posts, caption("first")).await.unwrap();
        wait_for(|| mirror.len() == 1).await;

        store.create(&CollectionRef::Posts, caption("second")).await.unwrap();
        wait_for(|| mirror.len() == 2).await;
        assert!(mirror.find(&first.id).is_some());

        store.delete(&CollectionRef::Posts, &first.id).await.unwrap();
        wait_for(|| mirror.len() == 1).await;
        assert_eq!(mirror.snapshot()[0].caption, "second");
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = subscribe::<Post, _>(store.clone(), CollectionRef::Posts, Order::desc("createdAt"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        wait_for(|| seen.load(Ordering::SeqCst) >= 1).await;

        sub.unsubscribe();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let before = seen.load(Ordering::SeqCst);
        store.create(&CollectionRef::Posts, caption("late")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), before);
        assert!(!store.feed().is_watched(&CollectionRef::Posts));
    }

    #[tokio::test]
    async fn test_failed_feed_stalls_and_keeps_last_list() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mirror: ListMirror<Post> = ListMirror::attach(store.clone(), CollectionRef::Posts);
        store.create(&CollectionRef::Posts, caption("kept")).await.unwrap();
        wait_for(|| mirror.len() == 1).await;

        store
            .feed()
            .publish(&CollectionRef::Posts, FeedState::Failed("backend gone".into()));
        wait_for(|| mirror.is_stalled()).await;
        assert_eq!(mirror.snapshot()[0].caption, "kept");

        // No retry: later writes never reach the stalled mirror
        wait_for(|| !store.feed().is_watched(&CollectionRef::Posts)).await;
        store.create(&CollectionRef::Posts, caption("missed")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mirror.len(), 1);
        assert!(mirror.is_stalled());
    }
}
