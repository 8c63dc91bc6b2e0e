//! Request extractors and cookie helpers

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use warden_types::ClientInfo;

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "warden_refresh";

/// Path the refresh cookie is scoped to
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Network origin of the request (peer address and user agent)
#[derive(Debug, Clone, Default)]
pub struct Client(pub ClientInfo);

impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Ok(Self(ClientInfo::new(ip_address, user_agent)))
    }
}

/// Refresh token from the `warden_refresh` cookie
pub fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(REFRESH_COOKIE)?.strip_prefix('='))
        .find(|value| !value.is_empty())
        .map(String::from)
}

/// `Set-Cookie` value delivering a refresh token
pub fn set_refresh_cookie(token: &str, max_age_secs: u64) -> String {
    format!(
        "{REFRESH_COOKIE}={token}; HttpOnly; Secure; SameSite=Strict; Path={REFRESH_COOKIE_PATH}; Max-Age={max_age_secs}"
    )
}

/// `Set-Cookie` value clearing the refresh token
pub fn clear_refresh_cookie() -> String {
    format!(
        "{REFRESH_COOKIE}=; HttpOnly; Secure; SameSite=Strict; Path={REFRESH_COOKIE_PATH}; Max-Age=0"
    )
}
