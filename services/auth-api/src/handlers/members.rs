//! Membership administration handlers
//!
//! All routes act on the caller's current tenant and require ADMIN or above.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_axum::{roles, ApiError, ApiResult, RequireRole};
use warden_db::MembershipRow;
use warden_types::{Role, UserId};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub active: bool,
}

impl From<MembershipRow> for MemberResponse {
    fn from(row: MembershipRow) -> Self {
        Self {
            user_id: row.user_id,
            tenant_id: row.tenant_id,
            role: row.role,
            active: row.active,
        }
    }
}

/// GET /api/v1/members
pub async fn list_members(
    State(state): State<AppState>,
    ctx: RequireRole<roles::Admin>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let members = state.auth.memberships().list_members(&ctx).await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// POST /api/v1/members
pub async fn add_member(
    State(state): State<AppState>,
    ctx: RequireRole<roles::Admin>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let row = state.auth.add_member(&ctx, req.user_id, req.role).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// PATCH /api/v1/members/{user_id}
pub async fn change_role(
    State(state): State<AppState>,
    ctx: RequireRole<roles::Admin>,
    Path(user_id): Path<String>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let user_id = parse_user(&user_id)?;
    let row = state.auth.change_role(&ctx, user_id, req.role).await?;
    Ok(Json(row.into()))
}

/// DELETE /api/v1/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    ctx: RequireRole<roles::Admin>,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user(&user_id)?;
    state.auth.remove_member(&ctx, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_user(raw: &str) -> ApiResult<UserId> {
    UserId::parse(raw).map_err(|_| ApiError::BadRequest("user id must be a UUID".to_string()))
}
