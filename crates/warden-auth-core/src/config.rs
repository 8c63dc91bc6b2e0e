//! Configuration types for the auth core

use std::time::Duration;

use crate::crypto::validate_secret;
use crate::lockout::LockoutPolicy;
use crate::AuthError;

/// Auth core configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret (at least 32 bytes)
    pub jwt_secret: String,
    /// `iss` claim written to and required on every token
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// Optional pepper prepended to passwords before hashing
    pub password_pepper: Option<String>,
    /// Lockout tiers and counting mode
    pub lockout: LockoutPolicy,
    /// How long membership resolutions are cached (zero disables)
    pub membership_cache_ttl: Duration,
    /// Deadline for each I/O-bound step
    pub io_timeout: Duration,
}

impl AuthConfig {
    /// Create a new auth config with default lifetimes
    pub fn new(jwt_secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer: issuer.into(),
            access_token_ttl: Duration::from_secs(30 * 60),        // 30 minutes
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            password_pepper: None,
            lockout: LockoutPolicy::default(),
            membership_cache_ttl: Duration::from_secs(15),
            io_timeout: Duration::from_secs(5),
        }
    }

    /// Reject configurations the core cannot run safely with
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_secret(self.jwt_secret.as_bytes())
            .map_err(|e| AuthError::Configuration(e.to_string()))?;
        if self.issuer.trim().is_empty() {
            return Err(AuthError::Configuration("issuer must not be empty".into()));
        }
        if self.access_token_ttl.is_zero() || self.refresh_token_ttl.is_zero() {
            return Err(AuthError::Configuration("token lifetimes must be positive".into()));
        }
        if self.access_token_ttl >= self.refresh_token_ttl {
            return Err(AuthError::Configuration(
                "access token must expire before the refresh token".into(),
            ));
        }
        self.lockout
            .validate()
            .map_err(|e| AuthError::Configuration(e.to_string()))
    }

    /// Set access token lifetime
    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Set refresh token lifetime
    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    /// Set password pepper
    #[must_use]
    pub fn with_password_pepper(mut self, pepper: impl Into<String>) -> Self {
        self.password_pepper = Some(pepper.into());
        self
    }

    /// Set lockout policy
    #[must_use]
    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    /// Set membership cache lifetime
    #[must_use]
    pub fn with_membership_cache_ttl(mut self, ttl: Duration) -> Self {
        self.membership_cache_ttl = ttl;
        self
    }

    /// Set I/O deadline
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "<set>"))
            .field("lockout", &self.lockout)
            .field("membership_cache_ttl", &self.membership_cache_ttl)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}
