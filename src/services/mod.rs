//! External collaborators: payments, image hosting and identity

pub mod catalog;
pub mod checkout;
pub mod identity;
pub mod upload;

pub use catalog::{catalog, normalize_size, MerchItem, SIZES};
pub use checkout::{CheckoutService, StripeCheckout, StripeConfig};
pub use identity::{AuthUser, DiscordConfig, DiscordIdentity, IdentityProvider};
pub use upload::{CloudinaryConfig, CloudinaryUploader, ImageUploader};
