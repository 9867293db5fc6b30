//! Password hashing for stored credentials.
//!
//! Argon2id with a fresh random salt per call; the digest is stored in PHC string form.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    EmptyInput,
    #[error("failed to hash password: {0}")]
    HashingFailed(String),
}

/// Hashes `plaintext`. The same input yields a different digest on every call.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    if plaintext.is_empty() {
        return Err(PasswordError::EmptyInput);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks `plaintext` against a stored digest. A malformed digest counts as a mismatch.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
