//! Cryptographic utilities for secure operations
//!
//! Token hashing for storage, constant-time comparison and signing-secret
//! validation.

use sha2::{Digest, Sha256};

/// Minimum allowed signing secret length in bytes (256 bits)
pub const MIN_SECRET_LENGTH: usize = 32;

/// Errors that can occur when accepting a signing secret
#[derive(Debug, Clone, thiserror::Error)]
pub enum SecretError {
    #[error("signing secret too short: got {actual} bytes, need at least {minimum}")]
    TooShort { actual: usize, minimum: usize },
}

/// Check a symmetric signing secret is long enough for HS256.
pub fn validate_secret(secret: &[u8]) -> Result<(), SecretError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(SecretError::TooShort {
            actual: secret.len(),
            minimum: MIN_SECRET_LENGTH,
        });
    }
    Ok(())
}

/// Constant-time byte slice comparison.
///
/// Returns `false` immediately if lengths differ (length is not secret),
/// otherwise compares every byte.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let result = a
        .iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));

    result == 0
}

/// Hash a token for storage.
///
/// SHA-256, hex encoded. The original token cannot be recovered from the
/// hash; lookups hash the presented value and compare hashes.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
