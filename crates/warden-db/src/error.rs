//! Database errors

use thiserror::Error;

use crate::rules::MembershipRule;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failed
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Unique constraint would be violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Membership change rejected by a tenant invariant
    #[error("membership rule violated: {0}")]
    MembershipRule(#[from] MembershipRule),

    /// A stored value could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl DbError {
    /// Map unique-violation errors to `Conflict`
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::Sqlx(err),
        }
    }
}

impl From<warden_types::ParseEnumError> for DbError {
    fn from(err: warden_types::ParseEnumError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<warden_types::RoleParseError> for DbError {
    fn from(err: warden_types::RoleParseError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Result alias for repository calls
pub type DbResult<T> = Result<T, DbError>;
