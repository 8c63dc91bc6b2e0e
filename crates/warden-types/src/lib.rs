//! Warden Types - Shared domain types
//!
//! This crate contains domain types used across Warden crates:
//! - Identifiers for users, tenants, memberships and refresh tokens
//! - The ordered role hierarchy
//! - Tenant subscription status and eligibility rules
//! - The per-request security context
//! - Audit events

pub mod audit;
pub mod context;
pub mod error;
pub mod ids;
pub mod role;
pub mod session;
pub mod tenant;

pub use audit::*;
pub use context::*;
pub use error::*;
pub use ids::*;
pub use role::*;
pub use session::*;
pub use tenant::*;
