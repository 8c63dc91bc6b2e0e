//! Warden Auth API
//!
//! Reference HTTP service for the tenant security core.
//!
//! ## Session Endpoints
//!
//! - `POST /api/v1/auth/login` - Open a session in a tenant
//! - `POST /api/v1/auth/refresh` - Rotate a refresh token (body or cookie)
//! - `POST /api/v1/auth/logout` - Revoke the presented refresh token
//! - `POST /api/v1/auth/logout-all` - Revoke every session of the caller
//! - `POST /api/v1/auth/switch-tenant` - Access token for another tenant
//! - `POST /api/v1/auth/password` - Change password, revoking all sessions
//! - `GET /api/v1/auth/me` - The request's security context
//!
//! ## Tenant Endpoints
//!
//! - `GET|POST /api/v1/members`, `PATCH|DELETE /api/v1/members/{user_id}`
//! - `GET|POST /api/v1/records/{collection}`
//! - `GET|PATCH|DELETE /api/v1/records/{collection}/{id}`
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod cleanup;
mod config;
mod extractors;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use warden_db::memory::MemoryStores;

use crate::config::{Config, LogFormat};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    tracing::info!("Starting Warden Auth API");
    tracing::info!(
        http_port = config.http_port,
        isolation_strict = config.isolation.strict,
        database = config.database_url.is_some(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let state = match config.database_url.clone() {
        Some(url) => {
            let pool = warden_db::create_pool(&url).await?;
            tracing::info!("Database pool created");
            warden_db::run_migrations(&pool).await?;
            tracing::info!("Migrations applied");
            AppState::postgres(pool, config.clone())?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            AppState::memory(&MemoryStores::new(), config.clone())?
        }
    };

    // Retention job
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = cleanup::spawn(
        state.auth.clone(),
        config.cleanup_interval,
        config.attempt_retention,
        shutdown_rx,
    );

    let app = routes::build_router(state, metrics_handle);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));

    if let Err(e) = run_http_server(app, addr).await {
        tracing::error!(error = ?e, "HTTP server error");
    }

    let _ = shutdown_tx.send(true);
    cleanup::join(cleanup, config.shutdown_grace).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("auth_api=debug".parse()?);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!("warden_logins_total", "Login attempts by outcome");
    metrics::describe_counter!("warden_refresh_total", "Refresh token rotations by outcome");
    metrics::describe_counter!(
        "warden_token_replays_total",
        "Consumed refresh tokens presented again"
    );
    metrics::describe_counter!("warden_lockouts_total", "Failures that crossed a lockout tier");

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
