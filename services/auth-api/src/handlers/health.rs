//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub database: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub latency_ms: u64,
}

/// GET /health - Liveness probe (fast, no dependencies)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "auth-api",
    })
}

/// GET /ready - Readiness probe (checks DB connectivity)
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Ok(Json(ReadyResponse {
            status: "ready",
            service: "auth-api",
            checks: ReadyChecks {
                database: CheckResult {
                    status: "memory",
                    latency_ms: 0,
                },
            },
        }));
    };

    let start = Instant::now();
    let db_result = sqlx::query("SELECT 1").fetch_one(pool).await;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match db_result {
        Ok(_) => Ok(Json(ReadyResponse {
            status: "ready",
            service: "auth-api",
            checks: ReadyChecks {
                database: CheckResult {
                    status: "ok",
                    latency_ms,
                },
            },
        })),
        Err(e) => {
            tracing::warn!(error = ?e, latency_ms, "readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
