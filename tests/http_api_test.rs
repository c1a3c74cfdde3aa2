//! HTTP API driven through the router with an in-memory store and fake collaborators

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use storefront::config::Args;
use storefront::db::{CollectionRef, DocumentStore, FeedHub, ListQuery, MemoryStore, Page, StoredDocument};
use storefront::server::{handle_request, AppState};
use storefront::services::{AuthUser, CheckoutService, IdentityProvider, ImageUploader};
use storefront::site::config::EffectiveConfig;
use storefront::{Result, StorefrontError};

const ADMIN_PASSWORD: &str = "letmein";

struct FakeCheckout {
    fail: bool,
}

#[async_trait::async_trait]
impl CheckoutService for FakeCheckout {
    async fn create_session(&self, size: &str) -> Result<String> {
        if self.fail {
            return Err(StorefrontError::Upstream("card network down".into()));
        }
        Ok(format!("https://checkout.test/session?size={}", size))
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct FakeUploader {
    received: Mutex<Vec<(usize, String)>>,
}

#[async_trait::async_trait]
impl ImageUploader for FakeUploader {
    async fn upload(&self, image: Bytes, content_type: &str) -> Result<String> {
        self.received
            .lock()
            .unwrap()
            .push((image.len(), content_type.to_string()));
        Ok("https://res.test/image.png".into())
    }

    fn is_configured(&self) -> bool {
        true
    }
}

struct FakeIdentity;

#[async_trait::async_trait]
impl IdentityProvider for FakeIdentity {
    async fn resolve(&self, access_token: &str) -> Result<AuthUser> {
        match access_token {
            "alice-token" => Ok(AuthUser {
                id: "alice".into(),
                display_name: "Alice".into(),
                avatar_url: None,
                email: None,
            }),
            "bob-token" => Ok(AuthUser {
                id: "bob".into(),
                display_name: "Bob".into(),
                avatar_url: None,
                email: None,
            }),
            _ => Err(StorefrontError::Unauthorized("access token rejected".into())),
        }
    }
}

/// Memory store whose counter updates always fail
struct BrokenCounters {
    inner: MemoryStore,
}

#[async_trait::async_trait]
impl DocumentStore for BrokenCounters {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn feed(&self) -> &FeedHub {
        self.inner.feed()
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn create(&self, collection: &CollectionRef, fields: Map<String, Value>) -> Result<StoredDocument> {
        self.inner.create(collection, fields).await
    }

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<StoredDocument>> {
        self.inner.get(collection, id).await
    }

    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument> {
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &CollectionRef, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn list(&self, collection: &CollectionRef, query: &ListQuery) -> Result<Page> {
        self.inner.list(collection, query).await
    }

    async fn increment(&self, _: &CollectionRef, _: &str, field: &str, _: i64) -> Result<i64> {
        Err(StorefrontError::Database(format!("$inc {} failed: write concern timeout", field)))
    }
}

struct TestApp {
    state: Arc<AppState>,
    uploader: Arc<FakeUploader>,
}

struct TestResponse {
    status: StatusCode,
    headers: hyper::HeaderMap,
    body: Value,
}

impl TestApp {
    fn new(checkout_fails: bool) -> Self {
        Self::build(&[], Arc::new(MemoryStore::new()), checkout_fails)
    }

    fn build(extra_args: &[&str], store: Arc<dyn DocumentStore>, checkout_fails: bool) -> Self {
        let mut argv = vec!["storefront", "--dev-mode", "--jwt-secret", "test-signing-key"];
        argv.extend_from_slice(extra_args);
        let args = Args::parse_from(argv);
        let uploader = Arc::new(FakeUploader::default());
        let site = EffectiveConfig {
            admin_password: Some(ADMIN_PASSWORD.into()),
            publishable_key: Some("pk_test_0123456789abc".into()),
            payment_link_monthly: Some("https://buy.test/monthly".into()),
            ..EffectiveConfig::default()
        };
        let state = AppState::with_services(
            args,
            store,
            site,
            Arc::new(FakeCheckout { fail: checkout_fails }),
            uploader.clone(),
            Arc::new(FakeIdentity),
        );
        Self {
            state: Arc::new(state),
            uploader,
        }
    }

    async fn send(&self, method: Method, uri: &str, headers: &[(&str, &str)], body: Bytes) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Full::new(body)).unwrap();
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let response = handle_request(Arc::clone(&self.state), addr, request)
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }

    async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(Method::GET, uri, headers, Bytes::new()).await
    }

    async fn json(&self, method: Method, uri: &str, headers: &[(&str, &str)], body: Value) -> TestResponse {
        self.send(method, uri, headers, Bytes::from(body.to_string())).await
    }

    async fn admin_token(&self) -> String {
        let response = self
            .json(Method::POST, "/api/admin/unlock", &[], json!({ "password": ADMIN_PASSWORD }))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        response.body["token"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, caption: &str) -> String {
        let response = self
            .json(
                Method::POST,
                "/api/posts",
                &[("x-admin-token", token)],
                json!({ "caption": caption, "imageUrl": "https://res.test/a.png" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_checkout_session_endpoint() {
    let app = TestApp::new(false);

    let response = app.get("/api/create-checkout-session", &[]).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers["allow"], "POST");

    let response = app
        .json(Method::POST, "/api/create-checkout-session", &[], json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Size is required");

    let response = app
        .json(Method::POST, "/api/create-checkout-session", &[], json!({ "size": "m" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["url"], "https://checkout.test/session?size=M");
}

#[tokio::test]
async fn test_checkout_failure_is_generic() {
    let app = TestApp::new(true);
    let response = app
        .json(Method::POST, "/api/create-checkout-session", &[], json!({ "size": "XL" }))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "Stripe checkout error");
}

#[tokio::test]
async fn test_public_config_hides_admin_secret() {
    let app = TestApp::new(false);
    let response = app.get("/api/config", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["checkoutEnabled"], false);
    assert_eq!(response.body["adminEnabled"], true);
    assert!(response.body["diagnostics"].as_array().unwrap().len() >= 6);
    assert!(!response.body.to_string().contains(ADMIN_PASSWORD));

    let response = app.get("/api/checkout/link?tier=monthly", &[]).await;
    assert_eq!(response.body["url"], "https://buy.test/monthly");
    let response = app.get("/api/checkout/link?tier=one-time", &[]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_unlock_gates_posting() {
    let app = TestApp::new(false);

    let response = app
        .json(Method::POST, "/api/admin/unlock", &[], json!({ "password": "nope" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .json(Method::POST, "/api/posts", &[], json!({ "caption": "hello" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let token = app.admin_token().await;
    let id = app.create_post(&token, "  new drop tonight  ").await;

    let response = app.get(&format!("/api/posts/{}", id), &[]).await;
    assert_eq!(response.body["caption"], "new drop tonight");
    assert_eq!(response.body["likes"], 0);

    let response = app
        .json(
            Method::POST,
            "/api/posts",
            &[("x-admin-token", token.as_str())],
            json!({ "caption": "x".repeat(2201) }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .json(
            Method::POST,
            "/api/posts",
            &[("x-admin-token", token.as_str())],
            json!({ "caption": "hi", "imageUrl": "javascript:alert(1)" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(Method::POST, "/api/admin/lock", &[("x-admin-token", token.as_str())], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app
        .send(Method::DELETE, &format!("/api/posts/{}", id), &[("x-admin-token", token.as_str())], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_feed_pages_newest_first() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    for i in 0..3 {
        app.create_post(&token, &format!("post {}", i)).await;
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    }

    let first = app.get("/api/posts?limit=2", &[]).await;
    let posts = first.body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["caption"], "post 2");
    let cursor = first.body["nextCursor"].as_str().unwrap().to_string();

    let second = app.get(&format!("/api/posts?limit=2&cursor={}", cursor), &[]).await;
    let posts = second.body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["caption"], "post 0");
    assert!(second.body["nextCursor"].is_null());
}

#[tokio::test]
async fn test_like_toggle_per_visitor() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let id = app.create_post(&token, "like me").await;
    let like = format!("/api/posts/{}/like", id);

    let response = app.send(Method::POST, &like, &[], Bytes::new()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.send(Method::POST, &like, &[("x-visitor-id", "v1")], Bytes::new()).await;
    assert_eq!(response.body["liked"], true);
    assert_eq!(response.body["likes"], 1);

    let response = app.send(Method::POST, &like, &[("x-visitor-id", "v2")], Bytes::new()).await;
    assert_eq!(response.body["liked"], true);
    assert_eq!(response.body["likes"], 2);

    let response = app.send(Method::POST, &like, &[("x-visitor-id", "v1")], Bytes::new()).await;
    assert_eq!(response.body["liked"], false);
    assert_eq!(response.body["likes"], 1);

    // A failed remote write leaves the visitor's ledger alone
    let response = app
        .send(Method::POST, "/api/posts/missing/like", &[("x-visitor-id", "v1")], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = app.send(Method::POST, &like, &[("x-visitor-id", "v1")], Bytes::new()).await;
    assert_eq!(response.body["liked"], true);
    assert_eq!(response.body["likes"], 2);
}

#[tokio::test]
async fn test_comments_require_sign_in_and_bump_count() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let id = app.create_post(&token, "talk to me").await;
    let comments = format!("/api/posts/{}/comments", id);

    let response = app.json(Method::POST, &comments, &[], json!({ "text": "hi" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .json(Method::POST, &comments, &[("authorization", "Bearer alice-token")], json!({ "text": "  first!  " }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["text"], "first!");
    assert_eq!(response.body["userName"], "Alice");
    let comment_id = response.body["id"].as_str().unwrap().to_string();

    let response = app.get(&format!("/api/posts/{}", id), &[]).await;
    assert_eq!(response.body["commentsCount"], 1);

    let response = app.get(&comments, &[]).await;
    assert_eq!(response.body["comments"].as_array().unwrap().len(), 1);

    let delete = format!("{}/{}", comments, comment_id);
    let response = app
        .send(Method::DELETE, &delete, &[("authorization", "Bearer bob-token")], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .send(Method::DELETE, &delete, &[("authorization", "Bearer alice-token")], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.get(&format!("/api/posts/{}", id), &[]).await;
    assert_eq!(response.body["commentsCount"], 0);
}

#[tokio::test]
async fn test_question_workflow() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let alice = [("authorization", "Bearer alice-token")];

    let response = app
        .json(Method::POST, "/api/questions", &alice, json!({ "text": "When is the hoodie drop?" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "open");
    let first = response.body["id"].as_str().unwrap().to_string();

    let response = app
        .json(Method::POST, "/api/questions", &alice, json!({ "text": "Favourite game?" }))
        .await;
    let second = response.body["id"].as_str().unwrap().to_string();

    let response = app
        .json(
            Method::PUT,
            &format!("/api/questions/{}/answer", first),
            &[("x-admin-token", token.as_str())],
            json!({ "answer": "Next month" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "answered");

    let response = app
        .json(
            Method::PUT,
            &format!("/api/questions/{}/answer", second),
            &[("x-admin-token", token.as_str())],
            json!({ "hidden": true }),
        )
        .await;
    assert_eq!(response.body["status"], "hidden");

    let response = app.get("/api/questions?filter=answered", &[]).await;
    assert_eq!(response.body["questions"].as_array().unwrap().len(), 1);
    let response = app.get("/api/questions?filter=all&q=NEXT", &[]).await;
    assert_eq!(response.body["questions"].as_array().unwrap().len(), 1);
    let response = app.get("/api/questions", &[]).await;
    assert_eq!(response.body["questions"].as_array().unwrap().len(), 1);
    let response = app.get("/api/questions", &[("x-admin-token", token.as_str())]).await;
    assert_eq!(response.body["questions"].as_array().unwrap().len(), 2);

    let response = app
        .json(
            Method::PUT,
            &format!("/api/questions/{}/answer", first),
            &[("x-admin-token", token.as_str())],
            json!({ "answer": "   " }),
        )
        .await;
    assert_eq!(response.body["status"], "open");
    assert!(response.body["answer"].is_null());

    let response = app.get("/api/questions?filter=bogus", &[]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_changelog_entries_and_chips() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;

    let response = app
        .json(
            Method::POST,
            "/api/changelog",
            &[("x-admin-token", token.as_str())],
            json!({ "title": "v2", "changes": "1. New merch page\n\n2. Faster feed\n" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["items"], json!(["New merch page", "Faster feed"]));

    let response = app
        .json(
            Method::POST,
            "/api/changelog",
            &[("x-admin-token", token.as_str())],
            json!({ "title": "empty", "changes": "\n  \n" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.get("/api/changelog?date=latest", &[]).await;
    assert_eq!(response.body["selected"], "latest");
    assert_eq!(response.body["entries"].as_array().unwrap().len(), 1);
    let chips = response.body["dates"].as_array().unwrap();
    assert_eq!(chips.len(), 1);

    let day = chips[0].as_str().unwrap();
    let response = app.get(&format!("/api/changelog?date={}", day), &[]).await;
    assert_eq!(response.body["entries"][0]["title"], "v2");
}

#[tokio::test]
async fn test_upload_requires_admin_and_image_type() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let png = Bytes::from_static(&[0x89, b'P', b'N', b'G']);

    let response = app
        .send(Method::POST, "/api/uploads", &[("content-type", "image/png")], png.clone())
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(
            Method::POST,
            "/api/uploads",
            &[("content-type", "text/plain"), ("x-admin-token", token.as_str())],
            png.clone(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Method::POST,
            "/api/uploads",
            &[("content-type", "image/png"), ("x-admin-token", token.as_str())],
            png,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["url"], "https://res.test/image.png");
}

#[tokio::test]
async fn test_identity_and_health_checks() {
    let app = TestApp::new(false);

    let response = app.get("/api/auth/me", &[]).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let response = app.get("/api/auth/me", &[("authorization", "Bearer alice-token")]).await;
    assert_eq!(response.body["displayName"], "Alice");

    let response = app.get("/health", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["store"]["kind"], "memory");
    let response = app.get("/readyz", &[]).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/api/nope", &[]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = app.send(Method::OPTIONS, "/api/posts", &[], Bytes::new()).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_answer_respects_caption_limit() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let response = app
        .json(
            Method::POST,
            "/api/questions",
            &[("authorization", "Bearer alice-token")],
            json!({ "text": "Tell me everything" }),
        )
        .await;
    let answer = format!("/api/questions/{}/answer", response.body["id"].as_str().unwrap());
    let admin = [("x-admin-token", token.as_str())];

    let response = app
        .json(Method::PUT, &answer, &admin, json!({ "answer": "x".repeat(2201) }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let response = app.get("/api/questions?filter=all", &admin).await;
    assert_eq!(response.body["questions"][0]["status"], "open");

    let response = app
        .json(Method::PUT, &answer, &admin, json!({ "answer": "x".repeat(2200) }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "answered");
}

#[tokio::test]
async fn test_comment_withdrawn_when_count_fails() {
    let store: Arc<dyn DocumentStore> = Arc::new(BrokenCounters {
        inner: MemoryStore::new(),
    });
    let app = TestApp::build(&[], store, false);
    let token = app.admin_token().await;
    let id = app.create_post(&token, "quiet thread").await;
    let comments = format!("/api/posts/{}/comments", id);

    let response = app
        .json(Method::POST, &comments, &[("authorization", "Bearer alice-token")], json!({ "text": "hello" }))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "Internal server error");
    assert!(!response.body.to_string().contains("write concern"));

    let response = app.get(&comments, &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["comments"].as_array().unwrap().is_empty());
    let response = app.get(&format!("/api/posts/{}", id), &[]).await;
    assert_eq!(response.body["commentsCount"], 0);
}

#[tokio::test]
async fn test_like_ledgers_are_bounded() {
    let app = TestApp::build(&["--like-ledger-max-visitors", "4"], Arc::new(MemoryStore::new()), false);
    let token = app.admin_token().await;
    let id = app.create_post(&token, "popular").await;
    let like = format!("/api/posts/{}/like", id);

    for i in 0..20 {
        let visitor = format!("visitor-{}", i);
        let response = app
            .send(Method::POST, &like, &[("x-visitor-id", visitor.as_str())], Bytes::new())
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["likes"], i + 1);
    }
    assert!(app.state.visitors.len() <= 4);

    // The most recent visitor is still remembered
    let response = app
        .send(Method::POST, &like, &[("x-visitor-id", "visitor-19")], Bytes::new())
        .await;
    assert_eq!(response.body["liked"], false);
    assert_eq!(response.body["likes"], 19);
}

#[tokio::test]
async fn test_get_post_follows_edits_and_deletes() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    let id = app.create_post(&token, "first draft").await;
    let post = format!("/api/posts/{}", id);
    let admin = [("x-admin-token", token.as_str())];

    let response = app.json(Method::PATCH, &post, &admin, json!({ "caption": "final cut" })).await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.get(&post, &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["caption"], "final cut");

    let response = app.send(Method::DELETE, &post, &admin, Bytes::new()).await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.get(&post, &[]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_passes_image_to_uploader_once() {
    let app = TestApp::new(false);
    let token = app.admin_token().await;
    // SOI, APP1 with 4 payload bytes, SOS with scan data, EOI
    let jpeg = Bytes::from_static(&[
        0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x06, b'E', b'x', b'i', b'f', 0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22,
        0xFF, 0xD9,
    ]);

    let response = app
        .send(
            Method::POST,
            "/api/uploads",
            &[("content-type", "image/jpeg"), ("x-admin-token", token.as_str())],
            jpeg.clone(),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let received = app.uploader.received.lock().unwrap().clone();
    assert_eq!(received, vec![(jpeg.len(), "image/jpeg".to_string())]);
}
