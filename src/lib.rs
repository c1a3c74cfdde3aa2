//! Storefront - API server for the GhostriderJunior creator site
//!
//! Serves the site's feed, comments, questions and changelog from a
//! document store, creates merch preorder checkout sessions, and hosts the
//! built single-page app.
//!
//! ## Modules
//!
//! - **site**: pure rules shared with the page (config resolution, unlock
//!   sequence, validators, like-state reducer)
//! - **db**: the document store seam with MongoDB and in-memory backends
//! - **mirror**: live local copies of remote collections
//! - **services**: Stripe checkout, Cloudinary upload, Discord identity
//! - **auth**: admin unlock sessions
//! - **routes** / **server**: the HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod mirror;
pub mod routes;
pub mod server;
pub mod services;
pub mod site;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, StorefrontError};
