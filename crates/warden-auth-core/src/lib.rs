//! Warden Auth Core - Session security and tenant access logic
//!
//! Password verification, brute-force lockout, access/refresh token
//! issuance and rotation, membership resolution and the per-request
//! context state machine. Framework-agnostic; the axum integration lives
//! in `warden-axum`.

pub mod config;
pub mod context;
pub mod crypto;
pub mod deadline;
pub mod error;
pub mod lockout;
pub mod membership;
pub mod password;
pub mod service;
pub mod token;

pub use config::*;
pub use context::*;
pub use crypto::*;
pub use deadline::with_deadline;
pub use error::*;
pub use lockout::*;
pub use membership::*;
pub use password::*;
pub use service::*;
pub use token::*;
