//! Shared test utilities for auth-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use warden_auth_core::{AuthConfig, AuthService};
use warden_db::memory::MemoryStores;
use warden_db::{CreateMembership, CreateTenant, MembershipRepository, Stores, TenantRepository};
use warden_types::{
    ClientInfo, LoginRequest, MemoryAuditSink, RequestSecurityContext, Role, SharedAuditSink,
    SubscriptionStatus, TenantId, UserId,
};

pub const PASSWORD: &str = "correct horse battery staple";
pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

/// Auth service over in-memory stores with a recording audit sink
pub struct Harness {
    pub stores: MemoryStores,
    pub audit: Arc<MemoryAuditSink>,
    pub service: AuthService,
}

pub fn test_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET, "warden-test")
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let stores = MemoryStores::new();
        let audit = Arc::new(MemoryAuditSink::new());
        let shared: SharedAuditSink = audit.clone();
        let service = AuthService::new(config, Stores::memory(&stores), shared)
            .expect("valid test config");
        Self {
            stores,
            audit,
            service,
        }
    }

    /// Create a user with [`PASSWORD`]
    pub async fn user(&self, email: &str) -> UserId {
        self.service
            .create_user(email, PASSWORD)
            .await
            .expect("create user")
            .user_id()
    }

    /// Create an ACTIVE tenant
    pub async fn tenant(&self) -> TenantId {
        self.tenant_with(SubscriptionStatus::Active, None, None).await
    }

    pub async fn tenant_with(
        &self,
        status: SubscriptionStatus,
        trial_ends_at: Option<DateTime<Utc>>,
        grace_period_ends_at: Option<DateTime<Utc>>,
    ) -> TenantId {
        let id = Uuid::new_v4();
        self.stores
            .tenants
            .create(CreateTenant {
                id,
                name: format!("tenant-{id}"),
                status: status.as_str().to_string(),
                trial_ends_at,
                grace_period_ends_at,
            })
            .await
            .expect("create tenant");
        TenantId(id)
    }

    /// Give `user` an active membership in `tenant`
    pub async fn member(&self, user: UserId, tenant: TenantId, role: Role) {
        self.stores
            .memberships
            .create(CreateMembership {
                id: Uuid::new_v4(),
                user_id: user.0,
                tenant_id: tenant.0,
                role: role.as_str().to_string(),
            })
            .await
            .expect("create membership");
    }

    /// Set a tenant's subscription status
    pub async fn set_status(&self, tenant: TenantId, status: SubscriptionStatus) {
        self.stores
            .tenants
            .update_status(tenant.0, status.as_str(), None, None)
            .await
            .expect("update status");
    }
}

pub fn client() -> ClientInfo {
    ClientInfo::new(Some("203.0.113.7".to_string()), Some("test-agent/1.0".to_string()))
}

pub fn login(email: &str, password: &str, tenant_id: TenantId) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
        tenant_id,
    }
}

pub fn ctx(user: UserId, tenant: TenantId, role: Role) -> RequestSecurityContext {
    RequestSecurityContext::new(user, tenant, role)
}
