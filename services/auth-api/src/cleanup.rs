//! Retention job
//!
//! Periodically deletes expired refresh tokens and login attempts older
//! than the retention period. Deletes are idempotent, so a sweep cut short
//! by shutdown is simply finished by the next one.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use warden_auth_core::AuthService;

/// Spawn the retention loop; it exits once `shutdown` flips to true
pub fn spawn(
    auth: AuthService,
    interval: Duration,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => sweep(&auth, retention).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("retention job stopped");
    })
}

async fn sweep(auth: &AuthService, retention: Duration) {
    match auth.retention_sweep(Utc::now(), retention).await {
        Ok(report) => tracing::info!(
            expired_tokens = report.expired_tokens,
            purged_attempts = report.purged_attempts,
            "retention sweep complete"
        ),
        Err(e) => tracing::error!(error = ?e, "retention sweep failed"),
    }
}

/// Wait up to `grace` for the job to stop, then abort it
pub async fn join(handle: JoinHandle<()>, grace: Duration) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = ?e, "retention job panicked"),
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "retention job did not stop in time, aborting");
            abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth_core::AuthConfig;
    use warden_db::memory::MemoryStores;
    use warden_db::Stores;
    use warden_types::TracingAuditSink;

    fn service() -> AuthService {
        let config = AuthConfig::new("cleanup-test-secret-that-is-32-bytes-long", "warden-test");
        let stores = MemoryStores::new();
        AuthService::new(config, Stores::memory(&stores), std::sync::Arc::new(TracingAuditSink))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = spawn(
            service(),
            Duration::from_secs(60),
            Duration::from_secs(86_400),
            rx,
        );

        tokio::time::sleep(Duration::from_secs(180)).await;
        tx.send(true).unwrap();

        let stopped = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_aborts_after_grace() {
        let stuck = tokio::spawn(std::future::pending::<()>());
        let start = tokio::time::Instant::now();
        join(stuck, Duration::from_secs(2)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
