//! Session handlers (login, refresh, logout, tenant switch, me)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use warden_axum::{ApiError, ApiResult, SecurityContext};
use warden_types::{
    AccessGrant, LoginRequest, Principal, RefreshRequest, SwitchTenantRequest, TokenPair,
};

use crate::extractors::{clear_refresh_cookie, refresh_cookie, set_refresh_cookie, Client};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Minimum accepted length for a new password
const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/auth/login
///
/// Open a session in a tenant; the refresh token is also set as a cookie
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let pair = state.auth.login(&req, &client).await?;
    Ok(with_refresh_cookie(&state, pair))
}

/// POST /api/v1/auth/refresh
///
/// Rotate a refresh token taken from the body or the cookie
pub async fn refresh(
    State(state): State<AppState>,
    Client(client): Client,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let raw = presented_refresh_token(&headers, &body)?;
    let pair = state.auth.refresh(&raw, &client).await?;
    Ok(with_refresh_cookie(&state, pair))
}

/// POST /api/v1/auth/logout
///
/// Revoke the presented refresh token
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let raw = presented_refresh_token(&headers, &body)?;
    let revoked = state.auth.logout(&raw).await?;
    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie())],
        Json(LogoutResponse { revoked }),
    ))
}

/// POST /api/v1/auth/logout-all
///
/// Revoke every refresh token of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    ctx: SecurityContext,
) -> ApiResult<impl IntoResponse> {
    let revoked = state.auth.logout_all(&ctx).await?;
    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie())],
        Json(LogoutAllResponse { revoked }),
    ))
}

/// POST /api/v1/auth/switch-tenant
pub async fn switch_tenant(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Json(req): Json<SwitchTenantRequest>,
) -> ApiResult<Json<AccessGrant>> {
    Ok(Json(state.auth.switch_tenant(&ctx, req.tenant_id).await?))
}

/// POST /api/v1/auth/password
///
/// Change the caller's password; every session of theirs is revoked
pub async fn change_password(
    State(state): State<AppState>,
    ctx: SecurityContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "new_password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let revoked = state
        .auth
        .change_password(&ctx, &req.current_password, &req.new_password)
        .await?;
    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie())],
        Json(LogoutAllResponse { revoked }),
    ))
}

/// GET /api/v1/auth/me
pub async fn me(ctx: SecurityContext) -> Json<Principal> {
    Json(Principal {
        user_id: ctx.user_id(),
        tenant_id: ctx.tenant_id(),
        role: ctx.role(),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn with_refresh_cookie(state: &AppState, pair: TokenPair) -> impl IntoResponse {
    let cookie = set_refresh_cookie(
        &pair.refresh_token,
        state.config.auth.refresh_token_ttl.as_secs(),
    );
    (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(pair))
}

/// Refresh token from a JSON body, falling back to the cookie
fn presented_refresh_token(headers: &HeaderMap, body: &[u8]) -> ApiResult<String> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
            .refresh_token
            .filter(|t| !t.is_empty())
    };

    from_body
        .or_else(|| refresh_cookie(headers))
        .ok_or_else(|| ApiError::BadRequest("refresh_token is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_refresh_token_sources() {
        let mut headers = HeaderMap::new();
        assert!(presented_refresh_token(&headers, b"").is_err());
        assert!(presented_refresh_token(&headers, b"{}").is_err());
        assert!(presented_refresh_token(&headers, b"not json").is_err());

        assert_eq!(
            presented_refresh_token(&headers, br#"{"refresh_token":"from-body"}"#).unwrap(),
            "from-body"
        );

        headers.insert(header::COOKIE, HeaderValue::from_static("warden_refresh=from-cookie"));
        assert_eq!(presented_refresh_token(&headers, b"").unwrap(), "from-cookie");
        // Body wins over cookie
        assert_eq!(
            presented_refresh_token(&headers, br#"{"refresh_token":"from-body"}"#).unwrap(),
            "from-body"
        );
    }
}
