//! Property-based tests for lockout evaluation
//!
//! These tests verify:
//! - Fewer failures than the first threshold never lock
//! - The lock length is the tier the tally falls into
//! - More failures never shorten the lock
//! - Tier strings survive a format/parse cycle

use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use warden_auth_core::{LockoutPolicy, LockoutTier};
use warden_db::AttemptSummary;

fn tally(failures: i64, ago_secs: i64) -> AttemptSummary {
    AttemptSummary {
        failures,
        last_failure_at: Some(Utc::now() - chrono::Duration::seconds(ago_secs)),
    }
}

fn expected_tier_secs(failures: i64) -> u64 {
    match failures {
        f if f >= 20 => 86_400,
        f if f >= 15 => 3_600,
        f if f >= 10 => 900,
        f if f >= 5 => 300,
        _ => 0,
    }
}

/// Strictly increasing thresholds and durations
fn arb_tiers() -> impl Strategy<Value = Vec<LockoutTier>> {
    prop::collection::vec((1u32..10, 1u64..1_000), 1..6).prop_map(|steps| {
        let mut threshold = 0;
        let mut secs = 0;
        steps
            .into_iter()
            .map(|(dt, ds)| {
                threshold += dt;
                secs += ds;
                LockoutTier {
                    threshold,
                    duration: Duration::from_secs(secs),
                }
            })
            .collect()
    })
}

proptest! {
    /// Property: below five failures the pair is never locked
    #[test]
    fn prop_below_threshold_never_locks(failures in 0i64..5, ago in 0i64..100_000) {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let status = policy.evaluate(&tally(failures, ago), now);
        prop_assert!(!status.locked);
        prop_assert_eq!(status.retry_after, Duration::ZERO);
    }

    /// Property: a fresh failure locks for exactly the tier's duration
    #[test]
    fn prop_lock_matches_tier(failures in 5i64..100) {
        let policy = LockoutPolicy::default();
        let summary = AttemptSummary { failures, last_failure_at: Some(Utc::now()) };
        let now = summary.last_failure_at.unwrap();
        let status = policy.evaluate(&summary, now);
        prop_assert!(status.locked);
        prop_assert_eq!(status.retry_after, Duration::from_secs(expected_tier_secs(failures)));
    }

    /// Property: retry_after never exceeds the tier and shrinks with time
    #[test]
    fn prop_retry_after_bounded(failures in 5i64..40, elapsed in 0i64..100_000) {
        let policy = LockoutPolicy::default();
        let last = Utc::now();
        let summary = AttemptSummary { failures, last_failure_at: Some(last) };
        let status = policy.evaluate(&summary, last + chrono::Duration::seconds(elapsed));

        let tier = expected_tier_secs(failures);
        let remaining = tier.saturating_sub(elapsed as u64);
        prop_assert_eq!(status.locked, remaining > 0);
        prop_assert_eq!(status.retry_after, Duration::from_secs(remaining));
    }

    /// Property: more failures never shorten the lock
    #[test]
    fn prop_more_failures_never_shorter(a in 0i64..60, b in 0i64..60) {
        let policy = LockoutPolicy::default();
        let last = Utc::now();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_status = policy.evaluate(&AttemptSummary { failures: low, last_failure_at: Some(last) }, last);
        let high_status = policy.evaluate(&AttemptSummary { failures: high, last_failure_at: Some(last) }, last);
        prop_assert!(high_status.retry_after >= low_status.retry_after);
    }

    /// Property: generated tier lists format and parse back unchanged
    #[test]
    fn prop_tiers_parse_back(tiers in arb_tiers()) {
        let raw = tiers
            .iter()
            .map(|t| format!("{}:{}", t.threshold, t.duration.as_secs()))
            .collect::<Vec<_>>()
            .join(",");
        let parsed = LockoutPolicy::parse_tiers(&raw).unwrap();
        prop_assert_eq!(&parsed, &tiers);
        let policy = LockoutPolicy::new(parsed, warden_auth_core::CountingMode::CumulativeUntilSuccess);
        prop_assert!(policy.is_ok());
    }

    /// Property: malformed tier strings never panic
    #[test]
    fn prop_garbage_tiers_never_panic(raw in "[0-9:,a-z ]{0,40}") {
        let _ = LockoutPolicy::parse_tiers(&raw);
    }
}
