//! HTTP routes for the storefront

pub mod assets;
pub mod auth;
pub mod changelog;
pub mod comments;
pub mod feed_ws;
pub mod health;
pub mod merch;
pub mod posts;
pub mod questions;
pub mod response;
pub mod site_config;
pub mod uploads;

pub use assets::handle_static;
pub use auth::{handle_lock, handle_me, handle_unlock};
pub use changelog::{handle_changelog, handle_create_entry, handle_delete_entry, handle_update_entry};
pub use comments::{handle_create_comment, handle_delete_comment, handle_list_comments};
pub use feed_ws::{handle_feed_ws, FeedMessage};
pub use health::{health_check, readiness_check, version_info};
pub use merch::{handle_create_checkout_session, handle_merch};
pub use posts::{
    handle_create_post, handle_delete_post, handle_get_post, handle_list_posts, handle_toggle_like,
    handle_update_post, VISITOR_HEADER,
};
pub use questions::{handle_answer, handle_ask, handle_delete_question, handle_list_questions};
pub use response::{error_response, json_response, preflight_response, read_body, respond};
pub use site_config::{handle_payment_link, handle_site_config};
pub use uploads::handle_upload;
