//! Storefront - API server for the GhostriderJunior creator site

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{
    auth::hash_secret,
    config::Args,
    db::{DocumentStore, MemoryStore, MongoClient, MongoStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Some(secret) = &args.hash_secret {
        println!("{}", hash_secret(secret)?);
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("storefront={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Storefront - GhostriderJunior");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {}", if args.memory_store { "memory" } else { "mongodb" });
    info!(
        "Static site: {}",
        args.static_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    info!("Commit: {}", option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"));
    info!("======================================");

    let store: Arc<dyn DocumentStore> = if args.memory_store {
        info!("Using in-memory document store");
        Arc::new(MemoryStore::new())
    } else {
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => Arc::new(MongoStore::new(client).await?),
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryStore::new())
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let site = args.resolve_site_config();
    let state = Arc::new(AppState::new(args, store, site));

    server::run(state).await?;
    Ok(())
}
