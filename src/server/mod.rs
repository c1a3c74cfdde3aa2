//! HTTP server and shared state

pub mod http;
pub mod visitors;

pub use http::{handle_request, run, AppState};
pub use visitors::VisitorLedgers;
