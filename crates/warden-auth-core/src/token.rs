//! Access and refresh tokens
//!
//! Both are HS256 JWTs. Access tokens are validated without I/O; refresh
//! tokens are additionally tracked in the credential store by SHA-256 hash,
//! rotated on every use and grouped into families so a replayed token can
//! take its whole lineage down with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use warden_db::{CreateRefreshToken, RefreshTokenRepository, RefreshTokenRow, RotateOutcome};
use warden_types::{
    AuditEvent, ClientInfo, RefreshTokenId, RevocationReason, Role, SharedAuditSink, TenantId,
    TokenFamilyId, TokenPair, UserId,
};

use crate::crypto::{constant_time_eq, hash_token};
use crate::{AuthConfig, AuthError};

const ACCESS_TYP: &str = "access";
const REFRESH_TYP: &str = "refresh";

// =============================================================================
// Claims
// =============================================================================

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: UserId,
    /// Tenant the token is scoped to
    pub tenant_id: TenantId,
    /// Role at issue time (re-resolved per request)
    pub role: Role,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Token type marker
    pub typ: String,
    /// Token ID
    pub jti: String,
    /// Issuer
    pub iss: String,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: UserId,
    /// Token ID (= refresh token row ID)
    pub jti: RefreshTokenId,
    /// Token family
    pub fam: TokenFamilyId,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Token type marker
    pub typ: String,
    /// Issuer
    pub iss: String,
}

// =============================================================================
// Codec
// =============================================================================

/// Signs and verifies tokens. Pure; no I/O.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from validated configuration
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        // Only HS256 is accepted: tokens whose header names any other
        // algorithm (including `none` and asymmetric ones) fail decoding.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an access token issued at `now`
    pub fn encode_access(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, AccessClaims), AuthError> {
        let claims = AccessClaims {
            sub: user_id,
            tenant_id,
            role,
            iat: now.timestamp(),
            exp: now.timestamp() + secs(self.access_ttl),
            typ: ACCESS_TYP.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Sign a refresh token issued at `now`
    pub fn encode_refresh(
        &self,
        user_id: UserId,
        family_id: TokenFamilyId,
        now: DateTime<Utc>,
    ) -> Result<(String, RefreshClaims), AuthError> {
        let claims = RefreshClaims {
            sub: user_id,
            jti: RefreshTokenId::new(),
            fam: family_id,
            iat: now.timestamp(),
            exp: now.timestamp() + secs(self.refresh_ttl),
            typ: REFRESH_TYP.to_string(),
            iss: self.issuer.clone(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Verify signature, algorithm, expiry, issuer and type of an access token
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self.verify(token)?;
        if claims.typ != ACCESS_TYP {
            tracing::debug!(typ = %claims.typ, "wrong token type presented as access token");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    /// Verify a refresh token's signature, expiry, issuer and type
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = self.verify(token)?;
        if claims.typ != REFRESH_TYP {
            tracing::debug!(typ = %claims.typ, "wrong token type presented as refresh token");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!(error = ?e, "failed to sign token");
            AuthError::Internal("failed to sign token".to_string())
        })
    }

    fn verify<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::TokenInvalid,
                }
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX / 2)
}

// =============================================================================
// Service
// =============================================================================

/// Issues, rotates and revokes token pairs
#[derive(Clone)]
pub struct TokenService {
    codec: Arc<TokenCodec>,
    repo: Arc<dyn RefreshTokenRepository>,
    audit: SharedAuditSink,
}

impl TokenService {
    /// Create a new token service
    pub fn new(
        codec: Arc<TokenCodec>,
        repo: Arc<dyn RefreshTokenRepository>,
        audit: SharedAuditSink,
    ) -> Self {
        Self { codec, repo, audit }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a fresh pair opening a new token family
    pub async fn issue(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role: Role,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let (row, pair) = self.mint(user_id, tenant_id, role, TokenFamilyId::new(), client, now)?;
        self.repo.create(row).await?;
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// `authorize` re-checks that the token's user may still act in the
    /// token's tenant and returns the role to embed; it runs before the old
    /// token is consumed, so a refused refresh leaves the token usable.
    pub async fn rotate<A, Fut>(
        &self,
        raw: &str,
        client: &ClientInfo,
        authorize: A,
    ) -> Result<TokenPair, AuthError>
    where
        A: FnOnce(UserId, TenantId) -> Fut + Send,
        Fut: Future<Output = Result<Role, AuthError>> + Send,
    {
        let claims = self.codec.decode_refresh(raw)?;
        let row = self.lookup(raw, &claims).await?;
        let now = Utc::now();

        if row.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        if row.revoked {
            let replayed = row
                .revocation_reason()?
                .is_some_and(|reason| reason.indicates_replay());
            if replayed {
                self.handle_replay(&row, now).await?;
                return Err(AuthError::TokenReplayDetected);
            }
            return Err(AuthError::TokenRevoked);
        }

        let role = authorize(row.user_id(), row.tenant_id()).await?;

        let (successor, pair) =
            self.mint(row.user_id(), row.tenant_id(), role, row.family_id(), client, now)?;
        match self.repo.rotate(row.id, successor, now).await? {
            RotateOutcome::Rotated(next) => {
                tracing::debug!(
                    user_id = %row.user_id,
                    family_id = %row.family_id,
                    replaced = %row.id,
                    successor = %next.id,
                    "refresh token rotated"
                );
                Ok(pair)
            }
            RotateOutcome::AlreadyConsumed => {
                self.handle_replay(&row, now).await?;
                Err(AuthError::TokenReplayDetected)
            }
        }
    }

    /// Revoke the presented refresh token (logout). Idempotent.
    ///
    /// Returns whether a live token was revoked by this call.
    pub async fn revoke(&self, raw: &str) -> Result<bool, AuthError> {
        let claims = match self.codec.decode_refresh(raw) {
            Ok(claims) => claims,
            // Nothing left to revoke once the token itself has expired.
            Err(AuthError::TokenExpired) => return Ok(false),
            Err(e) => return Err(e),
        };
        let Some(row) = self.lookup(raw, &claims).await.ok() else {
            return Ok(false);
        };
        Ok(self
            .repo
            .revoke(row.id, RevocationReason::Logout, Utc::now())
            .await?)
    }

    /// Revoke one token by ID
    pub async fn revoke_token(
        &self,
        id: RefreshTokenId,
        reason: RevocationReason,
    ) -> Result<bool, AuthError> {
        Ok(self.repo.revoke(id.0, reason, Utc::now()).await?)
    }

    /// Revoke every refresh token of a user
    pub async fn revoke_all(
        &self,
        user_id: UserId,
        reason: RevocationReason,
    ) -> Result<u64, AuthError> {
        let revoked = self
            .repo
            .revoke_all_for_user(user_id.0, reason, Utc::now())
            .await?;
        self.audit.record(AuditEvent::SessionsRevoked {
            user_id,
            reason: reason.to_string(),
            revoked,
        });
        Ok(revoked)
    }

    async fn lookup(&self, raw: &str, claims: &RefreshClaims) -> Result<RefreshTokenRow, AuthError> {
        let presented = hash_token(raw);
        let row = self
            .repo
            .find_by_hash(&presented)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        let bound = constant_time_eq(row.token_hash.as_bytes(), presented.as_bytes())
            && row.id == claims.jti.0
            && row.user_id == claims.sub.0
            && row.family_id == claims.fam.0;
        if !bound {
            tracing::warn!(token_id = %row.id, "refresh token row does not match its claims");
            return Err(AuthError::TokenInvalid);
        }
        Ok(row)
    }

    async fn handle_replay(&self, row: &RefreshTokenRow, now: DateTime<Utc>) -> Result<(), AuthError> {
        let revoked = self
            .repo
            .revoke_family(row.family_id, RevocationReason::ReplayDetected, now)
            .await?;

        tracing::warn!(
            user_id = %row.user_id,
            family_id = %row.family_id,
            token_id = %row.id,
            revoked,
            "refresh token replay detected, family revoked"
        );
        metrics::counter!("warden_token_replays_total").increment(1);
        self.audit.record(AuditEvent::TokenReplayDetected {
            user_id: row.user_id(),
            family_id: row.family_id(),
            revoked,
        });
        Ok(())
    }

    fn mint(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role: Role,
        family_id: TokenFamilyId,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<(CreateRefreshToken, TokenPair), AuthError> {
        let (access, _) = self.codec.encode_access(user_id, tenant_id, role, now)?;
        let (refresh, claims) = self.codec.encode_refresh(user_id, family_id, now)?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Internal("refresh expiry out of range".to_string()))?;

        let row = CreateRefreshToken {
            id: claims.jti.0,
            user_id: user_id.0,
            tenant_id: tenant_id.0,
            family_id: family_id.0,
            token_hash: hash_token(&refresh),
            expires_at,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        };
        let pair = TokenPair::bearer(access, refresh, self.codec.access_ttl.as_secs());
        Ok((row, pair))
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
