//! Live collection feed over WebSocket
//!
//! ## Protocol
//!
//! Connect: `ws://host/api/feed/{collection}` where collection is `posts`,
//! `questions`, `changelog` or `posts/{id}/comments`.
//!
//! Messages (server → client):
//! - `snapshot` - the whole collection in display order, sent on connect
//!   and after every change
//! - `error` - the feed failed; the server closes the socket afterwards
//!
//! Client text messages are ignored; pings are answered. Only the latest
//! snapshot is held for a slow client; older unsent ones are dropped.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::response::message_response;
use crate::db::schemas::{ChangelogEntry, Comment, Post, Question, QuestionFilter, RemoteRecord};
use crate::db::{CollectionRef, DocumentStore};
use crate::mirror::{subscribe, Subscription};
use crate::server::AppState;

type HyperWebSocket = hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Latest serialized snapshot; the sender drops when the feed stalls.
pub type SnapshotSender = watch::Sender<Option<String>>;

// ============================================================================
// Message Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Snapshot {
        collection: String,
        timestamp: String,
        items: Value,
    },
    Error {
        message: String,
    },
}

fn snapshot_message<T: Serialize>(collection: &CollectionRef, items: &[T]) -> Option<String> {
    let items = serde_json::to_value(items).ok()?;
    serde_json::to_string(&FeedMessage::Snapshot {
        collection: collection.path(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        items,
    })
    .ok()
}

fn forward<T: RemoteRecord>(
    store: Arc<dyn DocumentStore>,
    collection: CollectionRef,
    tx: SnapshotSender,
    keep: fn(&T) -> bool,
) -> Subscription {
    let order = collection.default_order();
    let label = collection.clone();
    subscribe(store, collection, order, move |records: Vec<T>| {
        let visible: Vec<T> = records.into_iter().filter(|r| keep(r)).collect();
        if let Some(json) = snapshot_message(&label, &visible) {
            tx.send_replace(Some(json));
        }
    })
}

/// Start mirroring `collection` into `tx` with its record type.
///
/// Hidden questions never go out over the public feed.
pub fn start_feed(
    store: Arc<dyn DocumentStore>,
    collection: CollectionRef,
    tx: SnapshotSender,
) -> Subscription {
    match collection {
        CollectionRef::Posts => forward::<Post>(store, collection, tx, |_| true),
        CollectionRef::Comments { .. } => forward::<Comment>(store, collection, tx, |_| true),
        CollectionRef::Questions => {
            forward::<Question>(store, collection, tx, |q| QuestionFilter::All.admits(q, false))
        }
        CollectionRef::Changelog => forward::<ChangelogEntry>(store, collection, tx, |_| true),
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// GET /api/feed/{collection}
pub fn handle_feed_ws<B>(state: Arc<AppState>, req: Request<B>, path: &str) -> Response<Full<Bytes>> {
    let Some(collection) = CollectionRef::from_path(path) else {
        return message_response(StatusCode::NOT_FOUND, "Unknown feed");
    };

    if !hyper_tungstenite::is_upgrade_request(&req) {
        return message_response(StatusCode::BAD_REQUEST, "WebSocket upgrade required");
    }

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "WebSocket upgrade failed");
        }
    };

    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                if let Err(e) = handle_feed_connection(ws, store, collection).await {
                    warn!("Feed WebSocket error: {}", e);
                }
            }
            Err(e) => {
                error!("WebSocket connection failed: {}", e);
            }
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

async fn handle_feed_connection(
    ws: HyperWebSocket,
    store: Arc<dyn DocumentStore>,
    collection: CollectionRef,
) -> Result<(), BoxError> {
    let (sender, receiver) = ws.split();
    let path = collection.path();
    info!(collection = %path, "Feed client connected");

    let (tx, rx) = watch::channel(None);
    let _subscription = start_feed(store, collection, tx);
    pump_feed(sender, receiver, rx, &path).await?;

    info!(collection = %path, "Feed client disconnected");
    Ok(())
}

/// Send snapshots to the client until either side goes away.
///
/// When the snapshot sender drops (the feed stalled) the client gets an
/// `error` message followed by a close frame.
async fn pump_feed<S, R, E>(
    mut sender: S,
    mut receiver: R,
    mut snapshots: watch::Receiver<Option<String>>,
    path: &str,
) -> Result<(), BoxError>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    let message = serde_json::to_string(&FeedMessage::Error {
                        message: "Feed unavailable".into(),
                    })?;
                    let _ = sender.send(WsMessage::Text(message)).await;
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(json) = latest {
                    if sender.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Ping(data))) => {
                        sender.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(other)) => {
                        debug!(collection = %path, "Ignoring client message: {:?}", other);
                    }
                    Some(Err(e)) => {
                        warn!(collection = %path, "Feed WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FeedState, MemoryStore};
    use futures_util::stream;
    use serde_json::json;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite;

    fn fields(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn next_snapshot(rx: &mut watch::Receiver<Option<String>>) -> Value {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let raw = rx.borrow_and_update().clone().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_questions_feed_hides_hidden() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .create(&CollectionRef::Questions, fields(json!({"text": "drop date?", "status": "open"})))
            .await
            .unwrap();
        store
            .create(&CollectionRef::Questions, fields(json!({"text": "secret", "status": "hidden"})))
            .await
            .unwrap();

        let (tx, mut rx) = watch::channel(None);
        let _sub = start_feed(store, CollectionRef::Questions, tx);

        let message = next_snapshot(&mut rx).await;
        assert_eq!(message["type"], "snapshot");
        assert_eq!(message["collection"], "questions");
        let items = message["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["text"], "drop date?");
    }

    #[tokio::test]
    async fn test_feed_follows_writes() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let (tx, mut rx) = watch::channel(None);
        let _sub = start_feed(store.clone(), CollectionRef::Posts, tx);

        let first = next_snapshot(&mut rx).await;
        assert!(first["items"].as_array().unwrap().is_empty());

        store
            .create(&CollectionRef::Posts, fields(json!({"caption": "new hoodie"})))
            .await
            .unwrap();
        let second = next_snapshot(&mut rx).await;
        assert_eq!(second["items"][0]["caption"], "new hoodie");
    }

    #[tokio::test]
    async fn test_slow_client_only_gets_latest_snapshot() {
        let (tx, rx) = watch::channel(None);
        for i in 0..100 {
            tx.send_replace(Some(format!("snapshot {}", i)));
        }
        drop(tx);

        let mut sent: Vec<WsMessage> = Vec::new();
        let client = stream::pending::<Result<WsMessage, tungstenite::Error>>();
        pump_feed(&mut sent, client, rx, "posts").await.unwrap();

        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], WsMessage::Text("snapshot 99".into()));
    }

    #[tokio::test]
    async fn test_stalled_feed_sends_error_and_closes() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .create(&CollectionRef::Posts, fields(json!({"caption": "before the outage"})))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(None);
        let _sub = start_feed(store.clone(), CollectionRef::Posts, tx);
        tokio::time::timeout(Duration::from_secs(2), async {
            while rx.borrow().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        store
            .feed()
            .publish(&CollectionRef::Posts, FeedState::Failed("backend gone".into()));

        let mut sent: Vec<WsMessage> = Vec::new();
        let client = stream::pending::<Result<WsMessage, tungstenite::Error>>();
        tokio::time::timeout(Duration::from_secs(2), pump_feed(&mut sent, client, rx, "posts"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sent.len(), 3);
        let WsMessage::Text(snapshot) = &sent[0] else {
            panic!("expected a snapshot first");
        };
        let snapshot: Value = serde_json::from_str(snapshot).unwrap();
        assert_eq!(snapshot["items"][0]["caption"], "before the outage");

        let WsMessage::Text(error) = &sent[1] else {
            panic!("expected an error message");
        };
        let error: Value = serde_json::from_str(error).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(sent[2], WsMessage::Close(None));
    }
}
