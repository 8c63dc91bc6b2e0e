//! End-to-end session flows over the in-memory stores
//!
//! Login, rotation with replay detection, logout, tenant switching and
//! membership administration, driven through `AuthService`.

mod common;

use std::time::Duration;

use common::{client, ctx, login, Harness, PASSWORD};
use futures::future::join_all;
use warden_auth_core::{hash_token, AuthError};
use warden_db::{MembershipRule, RefreshTokenRepository, UserRepository};
use warden_types::{IneligibleReason, Role, SubscriptionStatus};

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_issues_tenant_scoped_pair() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;

    let pair = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap();

    let claims = h.service.tokens().codec().validate_access(&pair.access_token).unwrap();
    assert_eq!(claims.sub, user);
    assert_eq!(claims.tenant_id, tenant);
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 1800);

    let row = h
        .stores
        .refresh_tokens
        .find_by_hash(&hash_token(&pair.refresh_token))
        .await
        .unwrap()
        .expect("refresh token row");
    assert!(!row.revoked);
    assert_eq!(row.user_id, user.0);
    assert_eq!(row.ip_address.as_deref(), Some("203.0.113.7"));
    assert_ne!(row.token_hash, pair.refresh_token);

    assert_eq!(h.audit.count("login_succeeded"), 1);
}

#[tokio::test]
async fn test_email_is_case_insensitive() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Staff).await;

    let result = h
        .service
        .login(&login("  A@X.com ", PASSWORD, tenant), &client())
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_alike() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Staff).await;

    let unknown = h
        .service
        .login(&login("nobody@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap_err();
    let wrong = h
        .service
        .login(&login("a@x.com", "wrong", tenant), &client())
        .await
        .unwrap_err();

    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.error_code(), wrong.error_code());
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(h.audit.count("login_failed"), 2);
}

#[tokio::test]
async fn test_deactivated_user_cannot_login() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Staff).await;
    h.stores.users.set_active(user.0, false).await.unwrap();

    let result = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_sixth_attempt_locked_even_with_correct_password() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;

    for _ in 0..5 {
        let result = h
            .service
            .login(&login("a@x.com", "wrong", tenant), &client())
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
    assert_eq!(h.audit.count("lockout_engaged"), 1);

    let err = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap_err();
    let retry_after = err.retry_after().expect("locked");
    assert!(retry_after > Duration::ZERO);
    assert!(retry_after <= Duration::from_secs(300));
    assert_eq!(err.status_code(), 429);

    // Locked rejections are not counted as failures
    let status = h.service.guard().check("a@x.com", "203.0.113.7").await.unwrap();
    assert_eq!(status.failures, 5);
}

#[tokio::test]
async fn test_lockout_is_per_ip() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;

    for _ in 0..5 {
        let _ = h
            .service
            .login(&login("a@x.com", "wrong", tenant), &client())
            .await;
    }

    let elsewhere = warden_types::ClientInfo::new(Some("198.51.100.1".to_string()), None);
    let result = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &elsewhere)
        .await;
    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_guesses_cannot_outrun_lockout() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .login(&login("a@x.com", "wrong", tenant), &client())
                    .await
            })
        })
        .collect();

    let mut invalid = 0;
    let mut locked = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Err(AuthError::InvalidCredentials) => invalid += 1,
            Err(AuthError::AccountLocked { .. }) => locked += 1,
            other => panic!("unexpected login outcome: {other:?}"),
        }
    }
    assert_eq!(invalid, 5);
    assert_eq!(locked, 15);
    assert_eq!(h.audit.count("lockout_engaged"), 1);

    let status = h.service.guard().check("a@x.com", "203.0.113.7").await.unwrap();
    assert_eq!(status.failures, 5);
    assert!(status.locked);

    let result = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await;
    assert!(matches!(result, Err(AuthError::AccountLocked { .. })));
}

#[tokio::test]
async fn test_interleaved_logins_admit_only_first_tier() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;

    // The correct password goes last, behind 19 guesses started with it.
    let requests: Vec<_> = (0..20)
        .map(|i| login("a@x.com", if i == 19 { PASSWORD } else { "wrong" }, tenant))
        .collect();
    let attempt_client = client();
    let results = join_all(requests.iter().map(|req| h.service.login(req, &attempt_client))).await;

    let admitted = results
        .iter()
        .filter(|r| !matches!(r, Err(AuthError::AccountLocked { .. })))
        .count();
    assert_eq!(admitted, 5);
    assert!(matches!(results[19], Err(AuthError::AccountLocked { .. })));
}

#[tokio::test]
async fn test_login_into_non_member_tenant() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let home = h.tenant().await;
    let other = h.tenant().await;
    h.member(user, home, Role::Admin).await;

    let err = h
        .service
        .login(&login("a@x.com", PASSWORD, other), &client())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::TenantIneligible {
            reason: IneligibleReason::NoMembership
        }
    ));
    assert_eq!(err.status_code(), 403);
    assert_eq!(h.audit.count("tenant_access_denied"), 1);
}

#[tokio::test]
async fn test_login_into_suspended_tenant() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let tenant = h
        .tenant_with(SubscriptionStatus::Suspended, None, None)
        .await;
    h.member(user, tenant, Role::Owner).await;

    let err = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TENANT_SUSPENDED");
}

#[tokio::test]
async fn test_trial_tenant_admitted_until_trial_ends() {
    let h = Harness::new();
    let user = h.user("a@x.com").await;
    let running = h
        .tenant_with(
            SubscriptionStatus::Trial,
            Some(chrono::Utc::now() + chrono::Duration::days(3)),
            None,
        )
        .await;
    let ended = h
        .tenant_with(
            SubscriptionStatus::Trial,
            Some(chrono::Utc::now() - chrono::Duration::days(1)),
            None,
        )
        .await;
    h.member(user, running, Role::Owner).await;
    h.member(user, ended, Role::Owner).await;

    assert!(h
        .service
        .login(&login("a@x.com", PASSWORD, running), &client())
        .await
        .is_ok());
    let err = h
        .service
        .login(&login("a@x.com", PASSWORD, ended), &client())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TRIAL_EXPIRED");
}

// ============================================================================
// Refresh rotation
// ============================================================================

async fn logged_in(h: &Harness) -> (warden_types::UserId, warden_types::TenantId, warden_types::TokenPair) {
    let user = h.user("a@x.com").await;
    let tenant = h.tenant().await;
    h.member(user, tenant, Role::Admin).await;
    let pair = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap();
    (user, tenant, pair)
}

#[tokio::test]
async fn test_refresh_rotates_and_replay_kills_family() {
    let h = Harness::new();
    let (_, tenant, original) = logged_in(&h).await;

    let rotated = h
        .service
        .refresh(&original.refresh_token, &client())
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, original.refresh_token);
    let claims = h.service.tokens().codec().validate_access(&rotated.access_token).unwrap();
    assert_eq!(claims.tenant_id, tenant);

    let replay = h.service.refresh(&original.refresh_token, &client()).await;
    assert!(matches!(replay, Err(AuthError::TokenReplayDetected)));

    // The successor died with its family
    let successor = h.service.refresh(&rotated.refresh_token, &client()).await;
    assert!(matches!(successor, Err(AuthError::TokenReplayDetected)));

    assert_eq!(h.audit.count("token_replay_detected"), 2);
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let h = Harness::new();
    let (_, _, pair) = logged_in(&h).await;

    let ctx = client();
    let attempts = (0..8).map(|_| h.service.refresh(&pair.refresh_token, &ctx));
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AuthError::TokenReplayDetected)));
}

#[tokio::test]
async fn test_garbage_refresh_token_is_invalid() {
    let h = Harness::new();
    let result = h.service.refresh("definitely-not-a-token", &client()).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let h = Harness::new();
    let (_, _, pair) = logged_in(&h).await;
    let result = h.service.refresh(&pair.access_token, &client()).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn test_suspended_tenant_cannot_refresh() {
    let h = Harness::new();
    let (_, tenant, pair) = logged_in(&h).await;
    h.set_status(tenant, SubscriptionStatus::Suspended).await;

    let err = h
        .service
        .refresh(&pair.refresh_token, &client())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TENANT_SUSPENDED");

    // The refused refresh did not consume the token
    let row = h
        .stores
        .refresh_tokens
        .find_by_hash(&hash_token(&pair.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(!row.revoked);
}

// ============================================================================
// Logout and revocation
// ============================================================================

#[tokio::test]
async fn test_logout_revokes_and_is_idempotent() {
    let h = Harness::new();
    let (_, _, pair) = logged_in(&h).await;

    assert!(h.service.logout(&pair.refresh_token).await.unwrap());
    assert!(!h.service.logout(&pair.refresh_token).await.unwrap());

    let result = h.service.refresh(&pair.refresh_token, &client()).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn test_logout_rejects_garbage() {
    let h = Harness::new();
    assert!(matches!(
        h.service.logout("garbage").await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let h = Harness::new();
    let (user, tenant, first) = logged_in(&h).await;
    let second = h
        .service
        .login(&login("a@x.com", PASSWORD, tenant), &client())
        .await
        .unwrap();

    let revoked = h
        .service
        .logout_all(&ctx(user, tenant, Role::Admin))
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    for pair in [first, second] {
        let result = h.service.refresh(&pair.refresh_token, &client()).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }
    assert_eq!(h.audit.count("sessions_revoked"), 1);
}

#[tokio::test]
async fn test_change_password_revokes_sessions() {
    let h = Harness::new();
    let (user, tenant, pair) = logged_in(&h).await;
    let caller = ctx(user, tenant, Role::Admin);

    let wrong = h.service.change_password(&caller, "nope", "new-password").await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let revoked = h
        .service
        .change_password(&caller, PASSWORD, "new-password")
        .await
        .unwrap();
    assert_eq!(revoked, 1);

    assert!(matches!(
        h.service.refresh(&pair.refresh_token, &client()).await,
        Err(AuthError::TokenRevoked)
    ));
    assert!(h
        .service
        .login(&login("a@x.com", "new-password", tenant), &client())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_retention_sweep_keeps_live_tokens() {
    let h = Harness::new();
    let (_, _, pair) = logged_in(&h).await;

    let report = h
        .service
        .retention_sweep(chrono::Utc::now(), Duration::from_secs(30 * 86_400))
        .await
        .unwrap();
    assert_eq!(report.expired_tokens, 0);
    assert_eq!(report.purged_attempts, 0);

    // A sweep far in the future removes the expired token and old attempts
    let later = chrono::Utc::now() + chrono::Duration::days(60);
    let report = h
        .service
        .retention_sweep(later, Duration::from_secs(30 * 86_400))
        .await
        .unwrap();
    assert_eq!(report.expired_tokens, 1);
    assert_eq!(report.purged_attempts, 1);
    assert!(h
        .stores
        .refresh_tokens
        .find_by_hash(&hash_token(&pair.refresh_token))
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Request context and tenant switching
// ============================================================================

#[tokio::test]
async fn test_authenticate_publishes_context() {
    let h = Harness::new();
    let (user, tenant, pair) = logged_in(&h).await;

    let context = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    assert_eq!(context.user_id(), user);
    assert_eq!(context.tenant_id(), tenant);
    assert_eq!(context.role(), Role::Admin);
    assert!(!context.is_system());
    assert!(context.token_id().is_some());
}

#[tokio::test]
async fn test_authenticate_rejections() {
    let h = Harness::new();
    assert!(matches!(
        h.service.authenticate(None).await,
        Err(AuthError::TenantContextMissing)
    ));
    assert!(matches!(
        h.service.authenticate(Some("x.y.z")).await,
        Err(AuthError::TokenInvalid)
    ));
    assert_eq!(h.audit.count("token_rejected"), 1);
}

#[tokio::test]
async fn test_removed_member_rejected_on_next_request() {
    let h = Harness::new();
    let (user, tenant, pair) = logged_in(&h).await;
    let admin = h.user("b@x.com").await;
    h.member(admin, tenant, Role::Admin).await;

    h.service
        .remove_member(&ctx(admin, tenant, Role::Admin), user)
        .await
        .unwrap();

    let err = h
        .service
        .authenticate(Some(&pair.access_token))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::TenantIneligible {
            reason: IneligibleReason::NoMembership
        }
    ));
}

#[tokio::test]
async fn test_demotion_applies_on_next_request() {
    let h = Harness::new();
    let (user, tenant, pair) = logged_in(&h).await;
    let admin = h.user("b@x.com").await;
    h.member(admin, tenant, Role::Admin).await;

    // Warm the membership cache with the old role
    let before = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    assert_eq!(before.role(), Role::Admin);

    h.service
        .change_role(&ctx(admin, tenant, Role::Admin), user, Role::Staff)
        .await
        .unwrap();

    let after = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    assert_eq!(after.role(), Role::Staff);
    assert!(matches!(
        after.require_role(Role::Admin),
        Err(warden_types::InsufficientRole { .. })
    ));
}

#[tokio::test]
async fn test_switch_to_non_member_tenant_keeps_current_token() {
    let h = Harness::new();
    let (user, tenant, pair) = logged_in(&h).await;
    let foreign = h.tenant().await;

    let current = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    let err = h.service.switch_tenant(&current, foreign).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::TenantIneligible {
            reason: IneligibleReason::NoMembership
        }
    ));

    let still = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    assert_eq!(still.user_id(), user);
    assert_eq!(still.tenant_id(), tenant);
    assert_eq!(h.audit.count("tenant_switched"), 0);
}

#[tokio::test]
async fn test_switch_tenant_mints_scoped_access_token() {
    let h = Harness::new();
    let (user, home, pair) = logged_in(&h).await;
    let second = h.tenant().await;
    h.member(user, second, Role::Finance).await;

    let current = h.service.authenticate(Some(&pair.access_token)).await.unwrap();
    let grant = h.service.switch_tenant(&current, second).await.unwrap();
    assert_eq!(grant.tenant_id, second);
    assert_eq!(grant.role, Role::Finance);

    let switched = h.service.authenticate(Some(&grant.access_token)).await.unwrap();
    assert_eq!(switched.tenant_id(), second);
    assert_eq!(switched.role(), Role::Finance);
    assert_eq!(h.audit.count("tenant_switched"), 1);

    // The refresh token still belongs to the login tenant
    let refreshed = h.service.refresh(&pair.refresh_token, &client()).await.unwrap();
    let claims = h
        .service
        .tokens()
        .codec()
        .validate_access(&refreshed.access_token)
        .unwrap();
    assert_eq!(claims.tenant_id, home);
}

// ============================================================================
// Membership administration
// ============================================================================

#[tokio::test]
async fn test_membership_admin_requires_admin() {
    let h = Harness::new();
    let tenant = h.tenant().await;
    let staff = h.user("staff@x.com").await;
    let newcomer = h.user("new@x.com").await;
    h.member(staff, tenant, Role::Staff).await;

    let err = h
        .service
        .add_member(&ctx(staff, tenant, Role::Staff), newcomer, Role::Sales)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InsufficientRole { .. }));
    assert_eq!(h.audit.count("insufficient_role"), 1);
}

#[tokio::test]
async fn test_membership_invariants() {
    let h = Harness::new();
    let tenant = h.tenant().await;
    let owner = h.user("owner@x.com").await;
    let admin = h.user("admin@x.com").await;
    let newcomer = h.user("new@x.com").await;
    h.member(owner, tenant, Role::Owner).await;
    h.member(admin, tenant, Role::Admin).await;
    let by_admin = ctx(admin, tenant, Role::Admin);

    // Owner can be neither granted nor touched
    assert!(matches!(
        h.service.add_member(&by_admin, newcomer, Role::Owner).await,
        Err(AuthError::MembershipRule(MembershipRule::OwnerNotGrantable))
    ));
    assert!(matches!(
        h.service.change_role(&by_admin, owner, Role::Staff).await,
        Err(AuthError::MembershipRule(MembershipRule::OwnerImmutable))
    ));
    assert!(matches!(
        h.service.remove_member(&by_admin, owner).await,
        Err(AuthError::MembershipRule(MembershipRule::OwnerImmutable))
    ));

    // Admin can leave because the owner still counts as admin-or-above
    h.service.add_member(&by_admin, newcomer, Role::Sales).await.unwrap();
    h.service.remove_member(&by_admin, admin).await.unwrap();
    assert_eq!(h.audit.count("membership_changed"), 2);
}

#[tokio::test]
async fn test_last_admin_cannot_leave() {
    let h = Harness::new();
    let tenant = h.tenant().await;
    let admin = h.user("admin@x.com").await;
    let staff = h.user("staff@x.com").await;
    h.member(admin, tenant, Role::Admin).await;
    h.member(staff, tenant, Role::Staff).await;
    let by_admin = ctx(admin, tenant, Role::Admin);

    let err = h.service.remove_member(&by_admin, admin).await.unwrap_err();
    assert!(matches!(err, AuthError::MembershipRule(MembershipRule::LastAdmin)));
    assert_eq!(err.status_code(), 409);

    assert!(matches!(
        h.service.change_role(&by_admin, admin, Role::Staff).await,
        Err(AuthError::MembershipRule(MembershipRule::LastAdmin))
    ));

    // Unknown member
    let stranger = h.user("stranger@x.com").await;
    assert!(matches!(
        h.service.remove_member(&by_admin, stranger).await,
        Err(AuthError::MembershipNotFound)
    ));
}
