//! Session and token types

use serde::{Deserialize, Serialize};

use crate::{Role, TenantId, UserId};

/// Token pair returned after authentication or rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived, only ever returned here)
    pub refresh_token: String,
    /// Access token expiration in seconds
    pub expires_in: u64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

impl TokenPair {
    /// Create a bearer token pair
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Access token minted by a tenant switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    /// New access token
    pub access_token: String,
    /// Access token expiration in seconds
    pub expires_in: u64,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Tenant the token is bound to
    pub tenant_id: TenantId,
    /// Role inside that tenant
    pub role: Role,
}

/// Why a refresh token was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// Consumed by a successful rotation
    Rotated,
    /// Explicit logout
    Logout,
    /// User changed their password
    PasswordChange,
    /// Family killed after a reused token was presented
    ReplayDetected,
    /// Operator action
    Admin,
}

impl RevocationReason {
    /// Database representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Logout => "logout",
            Self::PasswordChange => "password_change",
            Self::ReplayDetected => "replay_detected",
            Self::Admin => "admin",
        }
    }

    /// Whether presenting a token revoked for this reason counts as replay.
    pub const fn indicates_replay(&self) -> bool {
        matches!(self, Self::Rotated | Self::ReplayDetected)
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RevocationReason {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotated" => Ok(Self::Rotated),
            "logout" => Ok(Self::Logout),
            "password_change" => Ok(Self::PasswordChange),
            "replay_detected" => Ok(Self::ReplayDetected),
            "admin" => Ok(Self::Admin),
            _ => Err(crate::ParseEnumError::new("revocation reason", s)),
        }
    }
}

/// Network origin of a request, recorded for forensics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client IP address
    pub ip_address: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Create client info
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }

    /// IP used as the lockout key; unknown origins share one bucket.
    pub fn ip_or_unknown(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
    /// Tenant to open the session in
    pub tenant_id: TenantId,
}

/// Refresh / logout request body (the cookie is accepted instead)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Raw refresh token
    pub refresh_token: Option<String>,
}

/// Tenant switch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchTenantRequest {
    /// Target tenant
    pub tenant_id: TenantId,
}

/// Authenticated identity returned by `/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
}
