//! Pure site rules shared by the request handlers
//!
//! Nothing in this module performs I/O beyond reading a config file on
//! request; every function is deterministic over its inputs.

pub mod admin;
pub mod config;
pub mod likes;
pub mod sequence;
pub mod validators;

pub use admin::resolve_secret;
pub use config::{diagnose, resolve, ConfigCheck, EffectiveConfig, HtmlMetaTags, PartialConfig, PaymentTier};
pub use likes::{toggle, LikeLedger, LikeState};
pub use sequence::{matches, KeyBuffer, UnlockGesture};
pub use validators::{check_caption, is_http_url, is_plausible_url, should_render_image, CAPTION_LIMIT};
