//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection, and a manual
//! `(method, path segments)` router.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::AdminGate;
use crate::config::Args;
use crate::db::schemas::Post;
use crate::db::{spawn_feed_refresh_task, CollectionRef, DocumentStore};
use crate::mirror::ListMirror;
use crate::routes::{self, response::BoxError};
use crate::services::{
    CheckoutService, CloudinaryUploader, DiscordIdentity, IdentityProvider, ImageUploader, StripeCheckout,
};
use crate::site::admin::resolve_secret;
use crate::site::config::EffectiveConfig;
use crate::types::StorefrontError;

use super::visitors::VisitorLedgers;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Posts, comments, questions and changelog
    pub store: Arc<dyn DocumentStore>,
    /// Resolved site configuration (explicit > runtime file > page meta tags)
    pub site: EffectiveConfig,
    pub admin: AdminGate,
    pub checkout: Arc<dyn CheckoutService>,
    pub uploader: Arc<dyn ImageUploader>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Live copy of the feed; like and comment counters are patched into it
    pub posts: ListMirror<Post>,
    /// Per-visitor like ledgers, keyed by `X-Visitor-Id`
    pub visitors: VisitorLedgers,
    pub started_at: Instant,
}

impl AppState {
    /// Build state with the Stripe, Cloudinary and Discord collaborators from `args`.
    ///
    /// Must be called inside a tokio runtime: the feed mirror starts immediately.
    pub fn new(args: Args, store: Arc<dyn DocumentStore>, site: EffectiveConfig) -> Self {
        let checkout: Arc<dyn CheckoutService> = Arc::new(StripeCheckout::new(args.stripe_config()));
        let uploader: Arc<dyn ImageUploader> = Arc::new(CloudinaryUploader::new(args.cloudinary_config()));
        let identity: Arc<dyn IdentityProvider> = Arc::new(DiscordIdentity::new(args.discord_config()));
        Self::with_services(args, store, site, checkout, uploader, identity)
    }

    /// Build state with explicit collaborators
    pub fn with_services(
        args: Args,
        store: Arc<dyn DocumentStore>,
        site: EffectiveConfig,
        checkout: Arc<dyn CheckoutService>,
        uploader: Arc<dyn ImageUploader>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let admin = AdminGate::new(
            resolve_secret(&site),
            args.jwt_secret().as_bytes(),
            args.admin_session_ttl(),
        );
        let posts = ListMirror::attach(Arc::clone(&store), CollectionRef::Posts);
        let visitors = VisitorLedgers::new(
            args.like_ledger_max_visitors,
            Duration::from_secs(args.like_ledger_idle_secs),
        );
        Self {
            args,
            store,
            site,
            admin,
            checkout,
            uploader,
            identity,
            posts,
            visitors,
            started_at: Instant::now(),
        }
    }
}

pub async fn run(state: Arc<AppState>) -> Result<(), StorefrontError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Storefront listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure admin token key in use unless JWT_SECRET is set");
    }
    if !state.site.checkout_enabled() {
        warn!("Landing page checkout disabled; /api/config carries diagnostics");
    }
    if !state.admin.is_enabled() {
        info!("Admin unlock disabled (no GRJ_ADMIN_PASSWORD or GRJ_ADMIN_KEY)");
    }

    spawn_feed_refresh_task(
        Arc::clone(&state.store),
        Duration::from_secs(state.args.feed_refresh_secs),
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
pub async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> Result<Response<BoxBody>, hyper::Error>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(to_boxed(routes::preflight_response()));
    }

    // Live feeds upgrade the connection and keep the request
    if let Some(feed) = path.strip_prefix("/api/feed/") {
        if method == Method::GET {
            return Ok(to_boxed(routes::handle_feed_ws(Arc::clone(&state), req, feed)));
        }
    }

    if !path.starts_with("/api/") && !is_health_path(&path) {
        let root = state.args.static_dir.as_deref();
        return Ok(to_boxed(routes::handle_static(root, &method, &path).await));
    }

    let (parts, body) = req.into_parts();
    let body = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        let limit = if path == "/api/uploads" {
            state.args.upload.max_upload_bytes
        } else {
            state.args.max_body_bytes
        };
        match routes::read_body(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(to_boxed(routes::error_response(&e))),
        }
    } else {
        Bytes::new()
    };

    let headers = &parts.headers;
    let uri = &parts.uri;
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let response = match (method.clone(), segments.as_slice()) {
        // Health
        (Method::GET, ["health"] | ["healthz"]) => routes::health_check(&state).await,
        (Method::GET, ["ready"] | ["readyz"]) => routes::readiness_check(&state).await,
        (Method::GET, ["version"]) => routes::version_info(),

        // ====================================================================
        // Site configuration and merch
        // ====================================================================
        (Method::GET, ["api", "config"]) => routes::handle_site_config(&state),
        (Method::GET, ["api", "checkout", "link"]) => {
            routes::respond(routes::handle_payment_link(&state, uri))
        }
        (_, ["api", "create-checkout-session"]) => {
            routes::handle_create_checkout_session(&state, &method, &body).await
        }
        (Method::GET, ["api", "merch"]) => routes::handle_merch(),

        // ====================================================================
        // Feed posts, likes and comments
        // ====================================================================
        (Method::GET, ["api", "posts"]) => routes::respond(routes::handle_list_posts(&state, uri).await),
        (Method::POST, ["api", "posts"]) => {
            routes::respond(routes::handle_create_post(&state, headers, &body).await)
        }
        (Method::GET, ["api", "posts", id]) => routes::respond(routes::handle_get_post(&state, id).await),
        (Method::PATCH, ["api", "posts", id]) => {
            routes::respond(routes::handle_update_post(&state, headers, id, &body).await)
        }
        (Method::DELETE, ["api", "posts", id]) => {
            routes::respond(routes::handle_delete_post(&state, headers, id).await)
        }
        (Method::POST, ["api", "posts", id, "like"]) => {
            routes::respond(routes::handle_toggle_like(&state, headers, id).await)
        }
        (Method::GET, ["api", "posts", id, "comments"]) => {
            routes::respond(routes::handle_list_comments(&state, id).await)
        }
        (Method::POST, ["api", "posts", id, "comments"]) => {
            routes::respond(routes::handle_create_comment(&state, headers, id, &body).await)
        }
        (Method::DELETE, ["api", "posts", id, "comments", cid]) => {
            routes::respond(routes::handle_delete_comment(&state, headers, id, cid).await)
        }

        // ====================================================================
        // Questions
        // ====================================================================
        (Method::GET, ["api", "questions"]) => {
            routes::respond(routes::handle_list_questions(&state, headers, uri).await)
        }
        (Method::POST, ["api", "questions"]) => {
            routes::respond(routes::handle_ask(&state, headers, &body).await)
        }
        (Method::PUT, ["api", "questions", id, "answer"]) => {
            routes::respond(routes::handle_answer(&state, headers, id, &body).await)
        }
        (Method::DELETE, ["api", "questions", id]) => {
            routes::respond(routes::handle_delete_question(&state, headers, id).await)
        }

        // ====================================================================
        // Changelog
        // ====================================================================
        (Method::GET, ["api", "changelog"]) => routes::respond(routes::handle_changelog(&state, uri).await),
        (Method::POST, ["api", "changelog"]) => {
            routes::respond(routes::handle_create_entry(&state, headers, &body).await)
        }
        (Method::PUT, ["api", "changelog", id]) => {
            routes::respond(routes::handle_update_entry(&state, headers, id, &body).await)
        }
        (Method::DELETE, ["api", "changelog", id]) => {
            routes::respond(routes::handle_delete_entry(&state, headers, id).await)
        }

        // ====================================================================
        // Uploads, identity and admin unlock
        // ====================================================================
        (Method::POST, ["api", "uploads"]) => {
            routes::respond(routes::handle_upload(&state, headers, body.clone()).await)
        }
        (Method::GET, ["api", "auth", "me"]) => routes::respond(routes::handle_me(&state, headers).await),
        (Method::POST, ["api", "admin", "unlock"]) => routes::respond(routes::handle_unlock(&state, &body)),
        (Method::POST, ["api", "admin", "lock"]) => routes::respond(routes::handle_lock(&state, headers)),

        _ => routes::response::not_found_response(&path),
    };

    info!("[{}] {} {} -> {}", addr, method, path, response.status().as_u16());
    Ok(to_boxed(response))
}

fn is_health_path(path: &str) -> bool {
    matches!(path, "/health" | "/healthz" | "/ready" | "/readyz" | "/version")
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
