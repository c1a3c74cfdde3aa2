//! Admin secret hashing and verification using Argon2
//!
//! The admin secret may be configured either in plain text (as the site's
//! meta tags historically held it) or as an Argon2 PHC string produced by
//! `storefront --hash-secret`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

use crate::types::{Result, StorefrontError};

/// Hash a secret using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StorefrontError::Config(format!("Failed to hash secret: {e}")))
}

/// Whether a configured secret is an Argon2 PHC string.
pub fn is_hashed(configured: &str) -> bool {
    configured.starts_with("$argon2")
}

/// Check a candidate against the configured secret.
///
/// Plain secrets are compared through their SHA-256 digests so the
/// comparison time does not depend on where the strings first differ.
pub fn verify_secret(candidate: &str, configured: &str) -> Result<bool> {
    if configured.is_empty() {
        return Ok(false);
    }
    if is_hashed(configured) {
        let parsed = PasswordHash::new(configured)
            .map_err(|e| StorefrontError::Config(format!("Invalid admin secret hash: {e}")))?;
        return Ok(Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok());
    }

    let a = Sha256::digest(candidate.as_bytes());
    let b = Sha256::digest(configured.as_bytes());
    Ok(a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0)
}
