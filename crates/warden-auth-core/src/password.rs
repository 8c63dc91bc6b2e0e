//! Password hashing and verification using Argon2id.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier as _};

use crate::AuthError;

/// Argon2id hasher/verifier with an optional pepper.
///
/// Holds a pre-computed hash of a random value so that lookups for unknown
/// emails can spend the same time verifying as lookups for real users.
#[derive(Clone)]
pub struct PasswordVerifier {
    pepper: Option<Arc<str>>,
    dummy_hash: Arc<str>,
}

impl PasswordVerifier {
    /// Create a verifier; hashes the dummy value once
    pub fn new(pepper: Option<&str>) -> Result<Self, AuthError> {
        let pepper: Option<Arc<str>> = pepper.filter(|p| !p.is_empty()).map(Arc::from);
        let dummy_input = uuid::Uuid::new_v4().to_string();
        let dummy_hash = hash_with(pepper.as_deref(), &dummy_input)?;
        Ok(Self {
            pepper,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Hash a password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_with(self.pepper.as_deref(), password)
    }

    /// Verify a password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch and an error only if the stored
    /// hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("invalid password hash format: {e}")))?;

        let input = peppered(self.pepper.as_deref(), password);
        match Argon2::default().verify_password(input.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal(format!("password verify error: {e}"))),
        }
    }

    /// Burn one verification for a non-existent account. Always false.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }

    /// [`verify`](Self::verify) on the blocking pool
    pub async fn verify_blocking(&self, password: String, hash: Option<String>) -> Result<bool, AuthError> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => verifier.verify(&password, &hash),
            None => Ok(verifier.verify_dummy(&password)),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password task failed: {e}")))?
    }

    /// [`hash`](Self::hash) on the blocking pool
    pub async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password task failed: {e}")))?
    }
}

impl std::fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordVerifier")
            .field("peppered", &self.pepper.is_some())
            .finish_non_exhaustive()
    }
}

fn peppered(pepper: Option<&str>, password: &str) -> String {
    match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    }
}

fn hash_with(pepper: Option<&str>, password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let input = peppered(pepper, password);
    Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}
