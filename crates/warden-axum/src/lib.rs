//! Warden Axum Integration
//!
//! Axum middleware and extractors that put the tenant security core in
//! front of handlers.
//!
//! # Overview
//!
//! - **Middleware**: [`SecurityLayer`] validates the bearer token, re-resolves
//!   the membership and publishes a [`RequestSecurityContext`] into the
//!   request extensions, or answers 401/403 itself
//! - **Extractors**: [`SecurityContext`], [`RequireRole`]
//! - **Errors**: [`ApiError`] renders every core error as
//!   `{"error":{"code","message","details"}}`
//!
//! # Quick Start
//!
//! ```ignore
//! use warden_axum::{RequireRole, SecurityContext, SecurityLayer, roles::Admin};
//! use axum::{Router, routing::get};
//!
//! async fn me(ctx: SecurityContext) -> String {
//!     format!("{} in {}", ctx.user_id(), ctx.tenant_id())
//! }
//!
//! async fn settings(_ctx: RequireRole<Admin>) -> &'static str {
//!     "admin only"
//! }
//!
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .route("/settings", get(settings))
//!     .layer(SecurityLayer::new(auth_service));
//! ```
//!
//! [`RequestSecurityContext`]: warden_types::RequestSecurityContext

pub mod error;
pub mod extractors;
pub mod layer;

pub use error::{ApiError, ApiResult, ErrorDetail, ErrorResponse};
pub use extractors::{roles, AuditHandle, RequireRole, RoleBound, SecurityContext};
pub use layer::{bearer_token, SecurityLayer, SecurityService};
