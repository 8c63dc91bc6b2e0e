//! Auth service - ties together lockout, passwords, tokens and memberships

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use warden_db::{CreateUser, MembershipRow, Stores, UserRow, LOCKED_REASON};
use warden_types::{
    AccessGrant, AuditEvent, ClientInfo, LoginRequest, RequestSecurityContext, RevocationReason,
    Role, SharedAuditSink, TenantId, TokenPair, UserId,
};

use crate::{
    with_deadline, AuthConfig, AuthError, BruteForceGuard, ContextResolver, MembershipResolver,
    PasswordVerifier, Resolution, TokenCodec, TokenService,
};

const INVALID_CREDENTIALS_REASON: &str = "invalid_credentials";

/// Rows removed by one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub expired_tokens: u64,
    pub purged_attempts: u64,
}

/// Authentication service
///
/// Provides the session-security operations used by the HTTP layer:
/// - Login with brute-force lockout
/// - Refresh token rotation with replay detection
/// - Logout and session-wide revocation
/// - Tenant switching and membership administration
/// - Per-request context establishment
#[derive(Clone)]
pub struct AuthService {
    config: Arc<AuthConfig>,
    stores: Stores,
    passwords: PasswordVerifier,
    guard: BruteForceGuard,
    tokens: TokenService,
    memberships: MembershipResolver,
    context: ContextResolver,
    audit: SharedAuditSink,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(config: AuthConfig, stores: Stores, audit: SharedAuditSink) -> Result<Self, AuthError> {
        let codec = Arc::new(TokenCodec::new(&config)?);
        let passwords = PasswordVerifier::new(config.password_pepper.as_deref())?;
        let guard = BruteForceGuard::new(
            Arc::clone(&stores.login_attempts),
            config.lockout.clone(),
            Arc::clone(&audit),
        );
        let tokens = TokenService::new(
            Arc::clone(&codec),
            Arc::clone(&stores.refresh_tokens),
            Arc::clone(&audit),
        );
        let memberships = MembershipResolver::new(
            Arc::clone(&stores.memberships),
            Arc::clone(&stores.tenants),
            config.membership_cache_ttl,
            Arc::clone(&audit),
        );
        let context = ContextResolver::new(
            codec,
            memberships.clone(),
            Arc::clone(&audit),
            config.io_timeout,
        );

        Ok(Self {
            config: Arc::new(config),
            stores,
            passwords,
            guard,
            tokens,
            memberships,
            context,
            audit,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn memberships(&self) -> &MembershipResolver {
        &self.memberships
    }

    pub fn guard(&self) -> &BruteForceGuard {
        &self.guard
    }

    pub fn passwords(&self) -> &PasswordVerifier {
        &self.passwords
    }

    pub fn audit(&self) -> &SharedAuditSink {
        &self.audit
    }

    async fn io<T, F>(&self, step: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        with_deadline(self.config.io_timeout, step, fut).await
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Authenticate with email and password and open a session in a tenant
    pub async fn login(&self, req: &LoginRequest, client: &ClientInfo) -> Result<TokenPair, AuthError> {
        let result = self.login_inner(req, client).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(AuthError::InvalidCredentials) => "invalid_credentials",
            Err(AuthError::AccountLocked { .. }) => "locked",
            Err(AuthError::TenantIneligible { .. }) => "ineligible",
            Err(_) => "error",
        };
        metrics::counter!("warden_logins_total", "outcome" => outcome).increment(1);
        result
    }

    async fn login_inner(&self, req: &LoginRequest, client: &ClientInfo) -> Result<TokenPair, AuthError> {
        let email = normalize_email(&req.email);
        let ip = client.ip_or_unknown();

        let ticket = match self.io("lockout check", self.guard.admit(&email, ip)).await {
            Ok(ticket) => ticket,
            Err(err @ AuthError::AccountLocked { .. }) => {
                self.login_failed(&email, ip, LOCKED_REASON);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let user = self
            .io("user lookup", async {
                Ok(self.stores.users.find_by_email(&email).await?)
            })
            .await?;

        // Unknown and deactivated users still pay for one Argon2 verification.
        let (user_id, stored_hash) = match user {
            Some(u) if u.active => (Some(u.user_id()), Some(u.password_hash)),
            _ => (None, None),
        };
        let valid = self
            .passwords
            .verify_blocking(req.password.clone(), stored_hash)
            .await?;

        let Some(user_id) = user_id.filter(|_| valid) else {
            let status = self
                .io(
                    "attempt log",
                    self.guard.fail(ticket, INVALID_CREDENTIALS_REASON),
                )
                .await?;
            tracing::debug!(email = %email, ip, failures = status.failures, "counted login failure");
            self.login_failed(&email, ip, INVALID_CREDENTIALS_REASON);
            return Err(AuthError::InvalidCredentials);
        };

        self.io("attempt log", self.guard.succeed(ticket)).await?;

        let tenant_id = req.tenant_id;
        let role = self.resolve_or_deny(user_id, tenant_id).await?;
        let pair = self
            .io("token issue", self.tokens.issue(user_id, tenant_id, role, client))
            .await?;

        tracing::info!(%user_id, %tenant_id, %role, ip, "login succeeded");
        self.audit.record(AuditEvent::LoginSucceeded {
            user_id,
            tenant_id,
            ip: ip.to_string(),
        });
        Ok(pair)
    }

    fn login_failed(&self, email: &str, ip: &str, reason: &str) {
        tracing::info!(email, ip, reason, "login failed");
        self.audit.record(AuditEvent::LoginFailed {
            email: email.to_string(),
            ip: ip.to_string(),
            reason: reason.to_string(),
        });
    }

    async fn resolve_or_deny(&self, user_id: UserId, tenant_id: TenantId) -> Result<Role, AuthError> {
        let resolution = self
            .io(
                "membership resolution",
                self.memberships.resolve_fresh(user_id, tenant_id),
            )
            .await?;
        if let Resolution::Denied(reason) = resolution {
            self.memberships.audit_denied(user_id, tenant_id, reason);
        }
        resolution.require()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Rotate a refresh token into a new pair
    pub async fn refresh(&self, raw: &str, client: &ClientInfo) -> Result<TokenPair, AuthError> {
        let users = Arc::clone(&self.stores.users);
        let memberships = self.memberships.clone();

        let result = self
            .io(
                "token rotation",
                self.tokens.rotate(raw, client, move |user_id, tenant_id| async move {
                    match users.find_by_id(user_id.0).await? {
                        Some(user) if user.active => {}
                        _ => return Err(AuthError::TokenInvalid),
                    }
                    let resolution = memberships.resolve_fresh(user_id, tenant_id).await?;
                    if let Resolution::Denied(reason) = resolution {
                        memberships.audit_denied(user_id, tenant_id, reason);
                    }
                    resolution.require()
                }),
            )
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AuthError::TokenReplayDetected) => "replay",
            Err(AuthError::TokenExpired) => "expired",
            Err(AuthError::TokenRevoked) => "revoked",
            Err(AuthError::TokenInvalid) => "invalid",
            Err(AuthError::TenantIneligible { .. }) => "ineligible",
            Err(_) => "error",
        };
        metrics::counter!("warden_refresh_total", "outcome" => outcome).increment(1);
        result
    }

    /// Revoke the presented refresh token. Idempotent.
    pub async fn logout(&self, raw: &str) -> Result<bool, AuthError> {
        self.io("logout", self.tokens.revoke(raw)).await
    }

    /// Revoke every refresh token of the caller
    pub async fn logout_all(&self, ctx: &RequestSecurityContext) -> Result<u64, AuthError> {
        let revoked = self
            .io(
                "logout all",
                self.tokens.revoke_all(ctx.user_id(), RevocationReason::Logout),
            )
            .await?;
        tracing::info!(user_id = %ctx.user_id(), revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Mint an access token for another tenant the caller belongs to.
    ///
    /// The refresh token is left as it is; on failure the current access
    /// token stays valid.
    pub async fn switch_tenant(
        &self,
        ctx: &RequestSecurityContext,
        target: TenantId,
    ) -> Result<AccessGrant, AuthError> {
        let user_id = ctx.user_id();
        let role = self.resolve_or_deny(user_id, target).await?;
        let (access_token, _) = self
            .tokens
            .codec()
            .encode_access(user_id, target, role, Utc::now())?;

        tracing::info!(%user_id, from = %ctx.tenant_id(), to = %target, %role, "tenant switched");
        self.audit.record(AuditEvent::TenantSwitched {
            user_id,
            from: ctx.tenant_id(),
            to: target,
            role,
        });

        Ok(AccessGrant {
            access_token,
            expires_in: self.config.access_token_ttl.as_secs(),
            token_type: "Bearer".to_string(),
            tenant_id: target,
            role,
        })
    }

    /// Change the caller's password and revoke all their refresh tokens
    pub async fn change_password(
        &self,
        ctx: &RequestSecurityContext,
        current: &str,
        new_password: &str,
    ) -> Result<u64, AuthError> {
        let user_id = ctx.user_id();
        let user = self
            .io("user lookup", async {
                Ok(self.stores.users.find_by_id(user_id.0).await?)
            })
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = self
            .passwords
            .verify_blocking(current.to_string(), Some(user.password_hash))
            .await?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        let hash = self.passwords.hash_blocking(new_password.to_string()).await?;
        self.io("password update", async {
            Ok(self.stores.users.update_password_hash(user_id.0, &hash).await?)
        })
        .await?;

        self.io(
            "session revocation",
            self.tokens
                .revoke_all(user_id, RevocationReason::PasswordChange),
        )
        .await
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Establish the security context for a bearer token
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<RequestSecurityContext, AuthError> {
        self.context.establish(bearer).await
    }

    // =========================================================================
    // Membership administration
    // =========================================================================

    pub async fn add_member(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
        role: Role,
    ) -> Result<MembershipRow, AuthError> {
        self.io("membership change", self.memberships.add_member(ctx, user_id, role))
            .await
    }

    pub async fn change_role(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
        role: Role,
    ) -> Result<MembershipRow, AuthError> {
        self.io("membership change", self.memberships.change_role(ctx, user_id, role))
            .await
    }

    pub async fn remove_member(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
    ) -> Result<MembershipRow, AuthError> {
        self.io("membership change", self.memberships.remove_member(ctx, user_id))
            .await
    }

    // =========================================================================
    // Users and retention
    // =========================================================================

    /// Create a user with a freshly hashed password
    pub async fn create_user(&self, email: &str, password: &str) -> Result<UserRow, AuthError> {
        let password_hash = self.passwords.hash_blocking(password.to_string()).await?;
        let user = CreateUser {
            id: uuid::Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
        };
        self.io("user create", async { Ok(self.stores.users.create(user).await?) })
            .await
    }

    /// Delete expired refresh tokens and login attempts older than `retention`
    pub async fn retention_sweep(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<RetentionReport, AuthError> {
        let cutoff = chrono::Duration::from_std(retention)
            .map(|r| now - r)
            .map_err(|e| AuthError::Configuration(format!("invalid retention: {e}")))?;

        let expired_tokens = self
            .io("token cleanup", async {
                Ok(self.stores.refresh_tokens.delete_expired(now).await?)
            })
            .await?;
        let purged_attempts = self
            .io("attempt cleanup", async {
                Ok(self.stores.login_attempts.purge_before(cutoff).await?)
            })
            .await?;

        Ok(RetentionReport {
            expired_tokens,
            purged_attempts,
        })
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Lockout and lookup key for an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
