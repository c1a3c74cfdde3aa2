//! Live mirrors over the in-memory store

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storefront::db::schemas::{Comment, Post};
use storefront::db::{CollectionRef, DocumentStore, MemoryStore};
use storefront::mirror::{subscribe, ListMirror};
use storefront::StorefrontError;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_mirror_tracks_remote_writes() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let mirror: ListMirror<Post> = ListMirror::attach(store.clone(), CollectionRef::Posts);

    let first = store
        .create(&CollectionRef::Posts, fields(json!({ "caption": "one" })))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(3)).await;
    store
        .create(&CollectionRef::Posts, fields(json!({ "caption": "two" })))
        .await
        .unwrap();

    eventually(|| mirror.len() == 2).await;
    let captions: Vec<String> = mirror.snapshot().into_iter().map(|p| p.caption).collect();
    assert_eq!(captions, vec!["two", "one"]);

    store.delete(&CollectionRef::Posts, &first.id).await.unwrap();
    eventually(|| mirror.len() == 1).await;
    assert!(!mirror.is_stalled());
}

#[tokio::test]
async fn test_invalid_records_are_skipped() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    store
        .create(&CollectionRef::Posts, fields(json!({ "caption": "fine" })))
        .await
        .unwrap();
    store
        .create(&CollectionRef::Posts, fields(json!({ "caption": 42 })))
        .await
        .unwrap();

    let mirror: ListMirror<Post> = ListMirror::attach(store, CollectionRef::Posts);
    eventually(|| mirror.len() == 1).await;
    assert_eq!(mirror.snapshot()[0].caption, "fine");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let post = store
        .create(&CollectionRef::Posts, fields(json!({ "caption": "thread" })))
        .await
        .unwrap();
    let comments = CollectionRef::Comments { post_id: post.id.clone() };

    let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = seen.clone();
    let subscription = subscribe(store.clone(), comments.clone(), comments.default_order(), move |c: Vec<Comment>| {
        sink.lock().unwrap().push(c.len());
    });

    eventually(|| !seen.lock().unwrap().is_empty()).await;
    subscription.unsubscribe();
    let delivered = seen.lock().unwrap().len();

    store
        .create(&comments, fields(json!({ "text": "late", "userId": "u1" })))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().len(), delivered);
}

#[tokio::test]
async fn test_failed_mutation_leaves_local_list() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let post = store
        .create(&CollectionRef::Posts, fields(json!({ "caption": "counted", "likes": 3 })))
        .await
        .unwrap();
    let mut mirror: ListMirror<Post> = ListMirror::attach(store.clone(), CollectionRef::Posts);
    eventually(|| mirror.len() == 1).await;
    mirror.detach();

    let result = mirror
        .mutate(
            store.increment(&CollectionRef::Posts, "missing", "likes", 1),
            |posts, likes| posts.iter_mut().for_each(|p| p.likes = *likes as u64),
        )
        .await;
    assert!(matches!(result, Err(StorefrontError::NotFound(_))));
    assert_eq!(mirror.find(&post.id).unwrap().likes, 3);

    let likes = mirror
        .mutate(
            store.increment(&CollectionRef::Posts, &post.id, "likes", 1),
            |posts, likes| {
                if let Some(p) = posts.iter_mut().find(|p| p.id == post.id) {
                    p.likes = *likes as u64;
                }
            },
        )
        .await
        .unwrap();
    assert_eq!(likes, 4);
    assert_eq!(mirror.find(&post.id).unwrap().likes, 4);
}
