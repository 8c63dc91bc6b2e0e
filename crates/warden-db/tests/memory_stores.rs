//! Contract tests for the in-memory stores

use chrono::{Duration, Utc};
use uuid::Uuid;
use warden_db::memory::*;
use warden_db::*;
use warden_types::{RevocationReason, Role, TenantId, UserId};

fn token(family: Uuid, hash: &str) -> CreateRefreshToken {
    CreateRefreshToken {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        family_id: family,
        token_hash: hash.to_string(),
        expires_at: Utc::now() + Duration::days(30),
        ip_address: Some("1.2.3.4".to_string()),
        user_agent: None,
    }
}

fn attempt(success: bool, reason: Option<&str>) -> NewLoginAttempt {
    NewLoginAttempt {
        id: Uuid::new_v4(),
        email: "a@x.com".to_string(),
        ip_address: "1.2.3.4".to_string(),
        success,
        failure_reason: reason.map(str::to_string),
        attempted_at: Utc::now(),
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

#[tokio::test]
async fn test_rotate_consumes_once() {
    let repo = MemoryRefreshTokenRepository::new();
    let family = Uuid::new_v4();
    let original = repo.create(token(family, "h0")).await.unwrap();

    let first = repo
        .rotate(original.id, token(family, "h1"), Utc::now())
        .await
        .unwrap();
    let successor = match first {
        RotateOutcome::Rotated(row) => row,
        RotateOutcome::AlreadyConsumed => panic!("first rotation must succeed"),
    };

    let second = repo
        .rotate(original.id, token(family, "h2"), Utc::now())
        .await
        .unwrap();
    assert!(matches!(second, RotateOutcome::AlreadyConsumed));

    let old = repo.find_by_id(original.id).await.unwrap().unwrap();
    assert!(old.revoked);
    assert_eq!(old.revocation_reason().unwrap(), Some(RevocationReason::Rotated));
    assert_eq!(old.replaced_by, Some(successor.id));
    // The losing successor was never written
    assert!(repo.find_by_hash("h2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_rotations_have_one_winner() {
    let repo = MemoryRefreshTokenRepository::new();
    let family = Uuid::new_v4();
    let original = repo.create(token(family, "root")).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.rotate(original.id, token(family, &format!("next-{i}")), Utc::now())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let outcomes = futures::future::join_all(handles).await;
    let winners = outcomes
        .into_iter()
        .filter(|o| matches!(o.as_ref().unwrap(), RotateOutcome::Rotated(_)))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(repo.len().await, 2);
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let repo = MemoryRefreshTokenRepository::new();
    let row = repo.create(token(Uuid::new_v4(), "h")).await.unwrap();

    assert!(repo.revoke(row.id, RevocationReason::Logout, Utc::now()).await.unwrap());
    assert!(!repo.revoke(row.id, RevocationReason::Logout, Utc::now()).await.unwrap());
    assert!(!repo.revoke(Uuid::new_v4(), RevocationReason::Logout, Utc::now()).await.unwrap());
}

#[tokio::test]
async fn test_revoke_family_only_touches_family() {
    let repo = MemoryRefreshTokenRepository::new();
    let (fam_a, fam_b) = (Uuid::new_v4(), Uuid::new_v4());
    repo.create(token(fam_a, "a1")).await.unwrap();
    repo.create(token(fam_a, "a2")).await.unwrap();
    let b = repo.create(token(fam_b, "b1")).await.unwrap();

    let revoked = repo
        .revoke_family(fam_a, RevocationReason::ReplayDetected, Utc::now())
        .await
        .unwrap();
    assert_eq!(revoked, 2);
    assert!(!repo.find_by_id(b.id).await.unwrap().unwrap().revoked);
}

#[tokio::test]
async fn test_delete_expired_keeps_live_tokens() {
    let repo = MemoryRefreshTokenRepository::new();
    let mut expired = token(Uuid::new_v4(), "old");
    expired.expires_at = Utc::now() - Duration::hours(1);
    repo.create(expired).await.unwrap();
    let live = repo.create(token(Uuid::new_v4(), "live")).await.unwrap();

    assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
    assert!(repo.find_by_id(live.id).await.unwrap().is_some());
    // Running again is a no-op
    assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 0);
}

// =============================================================================
// Login attempts
// =============================================================================

#[tokio::test]
async fn test_summary_counts_since_last_success() {
    let repo = MemoryLoginAttemptRepository::new();
    for _ in 0..3 {
        repo.record(attempt(false, Some("invalid_credentials")), None).await.unwrap();
    }
    repo.record(attempt(true, None), None).await.unwrap();
    let summary = repo
        .record(attempt(false, Some("invalid_credentials")), None)
        .await
        .unwrap();

    assert_eq!(summary.failures, 1);
    assert_eq!(repo.attempts_for("a@x.com", "1.2.3.4").await.len(), 5);
}

#[tokio::test]
async fn test_locked_rejections_are_not_counted() {
    let repo = MemoryLoginAttemptRepository::new();
    repo.record(attempt(false, Some("invalid_credentials")), None).await.unwrap();
    let summary = repo
        .record(attempt(false, Some(LOCKED_REASON)), None)
        .await
        .unwrap();
    assert_eq!(summary.failures, 1);
}

#[tokio::test]
async fn test_reservations_count_until_settled() {
    let repo = MemoryLoginAttemptRepository::new();

    let first = attempt(false, Some(PENDING_REASON));
    let first_id = first.id;
    let prior = repo.reserve(first, None).await.unwrap();
    assert_eq!(prior.failures, 0);

    // A second reservation sees the first one as a failure
    let second = attempt(false, Some(PENDING_REASON));
    let second_id = second.id;
    let prior = repo.reserve(second, None).await.unwrap();
    assert_eq!(prior.failures, 1);

    repo.settle(first_id, false, Some(LOCKED_REASON)).await.unwrap();
    repo.settle(second_id, false, Some("invalid_credentials")).await.unwrap();
    let summary = repo.summary("a@x.com", "1.2.3.4", None).await.unwrap();
    assert_eq!(summary.failures, 1);

    assert!(matches!(
        repo.settle(Uuid::new_v4(), true, None).await,
        Err(DbError::NotFound)
    ));
}

#[tokio::test]
async fn test_window_bounds_summary() {
    let repo = MemoryLoginAttemptRepository::new();
    let mut old = attempt(false, Some("invalid_credentials"));
    old.attempted_at = Utc::now() - Duration::hours(2);
    repo.record(old, None).await.unwrap();
    repo.record(attempt(false, Some("invalid_credentials")), None).await.unwrap();

    let window = Some(Utc::now() - Duration::hours(1));
    let summary = repo.summary("a@x.com", "1.2.3.4", window).await.unwrap();
    assert_eq!(summary.failures, 1);

    let purged = repo.purge_before(Utc::now() - Duration::hours(1)).await.unwrap();
    assert_eq!(purged, 1);
}

#[tokio::test]
async fn test_concurrent_failures_are_all_counted() {
    let repo = MemoryLoginAttemptRepository::new();
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.record(attempt(false, Some("invalid_credentials")), None)
                    .await
                    .unwrap()
                    .failures
            })
        })
        .collect();

    let mut tallies: Vec<i64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    tallies.sort_unstable();
    // Every writer saw a distinct count
    assert_eq!(tallies, (1..=10).collect::<Vec<i64>>());
}

// =============================================================================
// Memberships
// =============================================================================

#[tokio::test]
async fn test_membership_admin_changes() {
    let repo = MemoryMembershipRepository::new();
    let tenant = TenantId::new();
    let (owner, admin, staff) = (UserId::new(), UserId::new(), UserId::new());

    for (user, role) in [(owner, Role::Owner), (admin, Role::Admin)] {
        repo.create(CreateMembership {
            id: Uuid::new_v4(),
            user_id: user.0,
            tenant_id: tenant.0,
            role: role.as_str().to_string(),
        })
        .await
        .unwrap();
    }

    let added = repo
        .apply_change(tenant.0, MembershipChange::Add { user_id: staff, role: Role::Staff })
        .await
        .unwrap();
    assert_eq!(added.role().unwrap(), Role::Staff);

    let err = repo
        .apply_change(tenant.0, MembershipChange::Remove { user_id: owner })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::MembershipRule(MembershipRule::OwnerImmutable)));

    let removed = repo
        .apply_change(tenant.0, MembershipChange::Remove { user_id: staff })
        .await
        .unwrap();
    assert!(!removed.active);
    assert_eq!(repo.list_active_for_user(staff.0).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_second_owner_rejected() {
    let repo = MemoryMembershipRepository::new();
    let tenant = Uuid::new_v4();
    let create = |user: Uuid| CreateMembership {
        id: Uuid::new_v4(),
        user_id: user,
        tenant_id: tenant,
        role: "OWNER".to_string(),
    };
    repo.create(create(Uuid::new_v4())).await.unwrap();
    assert!(matches!(
        repo.create(create(Uuid::new_v4())).await,
        Err(DbError::Conflict(_))
    ));
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn test_record_scope_filters() {
    let store = MemoryRecordStore::new();
    let (a, b) = (TenantId::new(), TenantId::new());
    let row = store
        .insert(NewRecord {
            id: Uuid::new_v4(),
            tenant_id: a.0,
            collection: "products".to_string(),
            data: serde_json::json!({"name": "bolt"}),
        })
        .await
        .unwrap();

    assert!(store.get(Scope::Tenant(a), "products", row.id).await.unwrap().is_some());
    assert!(store.get(Scope::Tenant(b), "products", row.id).await.unwrap().is_none());
    assert!(store.get(Scope::Unscoped, "products", row.id).await.unwrap().is_some());
    assert!(store.get(Scope::Tenant(a), "customers", row.id).await.unwrap().is_none());

    assert!(!store.delete(Scope::Tenant(b), "products", row.id).await.unwrap());
    assert!(store.peek(row.id).is_some());
}
