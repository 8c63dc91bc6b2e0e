//! Tenant-owned record handlers
//!
//! Generic CRUD over JSON records. Every call goes through the isolation
//! guard with the request's context, so another tenant's record is simply
//! not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use warden_axum::{ApiError, ApiResult, SecurityContext};
use warden_db::RecordRow;

use crate::state::AppState;

const MAX_COLLECTION_LEN: usize = 64;
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// GET /api/v1/records/{collection}
pub async fn list_records(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<RecordRow>>> {
    validate_collection(&collection)?;
    let rows = state
        .records
        .scoped(Some(&ctx.0))
        .list(&collection, params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(rows))
}

/// POST /api/v1/records/{collection}
pub async fn create_record(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Path(collection): Path<String>,
    Json(data): Json<Value>,
) -> ApiResult<(StatusCode, Json<RecordRow>)> {
    validate_collection(&collection)?;
    validate_data(&data)?;
    let row = state.records.scoped(Some(&ctx.0)).insert(&collection, data).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/records/{collection}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<RecordRow>> {
    validate_collection(&collection)?;
    let id = parse_id(&id)?;
    Ok(Json(state.records.scoped(Some(&ctx.0)).get(&collection, id).await?))
}

/// PATCH /api/v1/records/{collection}/{id}
///
/// Replaces the record's data
pub async fn update_record(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Path((collection, id)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> ApiResult<Json<RecordRow>> {
    validate_collection(&collection)?;
    validate_data(&data)?;
    let id = parse_id(&id)?;
    let row = state
        .records
        .scoped(Some(&ctx.0))
        .update(&collection, id, data)
        .await?;
    Ok(Json(row))
}

/// DELETE /api/v1/records/{collection}/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    validate_collection(&collection)?;
    let id = parse_id(&id)?;
    state.records.scoped(Some(&ctx.0)).delete(&collection, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Validation
// ============================================================================

fn validate_collection(name: &str) -> ApiResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_LEN
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid collection name '{name}'")))
    }
}

fn validate_data(data: &Value) -> ApiResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(ApiError::BadRequest("record data must be a JSON object".to_string()))
    }
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("record id must be a UUID".to_string()))
}
