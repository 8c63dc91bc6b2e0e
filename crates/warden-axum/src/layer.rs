//! Tower middleware that establishes the request security context.
//!
//! [`SecurityLayer`] runs the context state machine for every request it
//! wraps. Requests that cannot be authenticated into an eligible tenant
//! never reach the inner service.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use warden_auth_core::AuthService;

use crate::error::ApiError;
use crate::extractors::AuditHandle;

/// Bearer token from the `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Tower layer that authenticates requests into a tenant.
#[derive(Clone)]
pub struct SecurityLayer {
    auth: AuthService,
}

impl SecurityLayer {
    /// Create a new security layer over the auth service.
    #[must_use]
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }
}

impl<S> Layer<S> for SecurityLayer {
    type Service = SecurityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// The security middleware service.
#[derive(Clone)]
pub struct SecurityService<S> {
    inner: S,
    auth: AuthService,
}

impl<S> Service<Request<Body>> for SecurityService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // The instance that was polled ready serves this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let auth = self.auth.clone();

        Box::pin(async move {
            let bearer = bearer_token(req.headers()).map(str::to_owned);
            match auth.authenticate(bearer.as_deref()).await {
                Ok(ctx) => {
                    tracing::debug!(
                        user_id = %ctx.user_id(),
                        tenant_id = %ctx.tenant_id(),
                        role = %ctx.role(),
                        "request authenticated"
                    );
                    req.extensions_mut().insert(ctx);
                    req.extensions_mut()
                        .insert(AuditHandle(std::sync::Arc::clone(auth.audit())));
                    inner.call(req).await
                }
                Err(e) => {
                    tracing::debug!(error = %e, path = %req.uri().path(), "request rejected");
                    Ok(ApiError::from(e).into_response())
                }
            }
        })
    }
}
