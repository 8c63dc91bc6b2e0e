//! Warden Isolation - Tenant predicate enforcement
//!
//! Handlers reach tenant-owned records only through [`IsolationGuard`]. The
//! guard turns the request's [`RequestSecurityContext`] into a tenant scope
//! that every read and write carries, stamps inserts with the owning tenant
//! and refuses to move a record between tenants.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_isolation::{IsolationConfig, IsolationGuard};
//!
//! let guard = IsolationGuard::new(store, IsolationConfig::default(), audit);
//! let invoices = guard.scoped(Some(&ctx)).list("invoices", 50).await?;
//! ```
//!
//! [`RequestSecurityContext`]: warden_types::RequestSecurityContext

pub mod config;
pub mod error;
pub mod guard;

pub use config::IsolationConfig;
pub use error::IsolationError;
pub use guard::{IsolationGuard, ScopedStore, TENANT_KEY};
