//! Credential hashes
//!
//! New hashes are argon2id PHC strings (`$argon2id$v=19$...`). Stores written
//! before that may still hold `sha256$<salt>$<hex digest of salt || password>`;
//! those keep verifying until the user is rehashed with `--hash-password`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::errors::AgentError;
use crate::utils::sha256_hash;

const LEGACY_SCHEME: &str = "sha256";

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AgentError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AgentError::Internal(format!("password hashing failed: {}", e)))
}

/// Check a password against a stored hash. Unknown formats never verify.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    if let (Some(LEGACY_SCHEME), Some(salt), Some(digest)) =
        (parts.next(), parts.next(), parts.next())
    {
        warn!("Verifying a legacy sha256 credential, rehash it with --hash-password");
        let computed = sha256_hash(format!("{}{}", salt, candidate).as_bytes());
        return computed.as_bytes().ct_eq(digest.as_bytes()).into();
    }

    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
