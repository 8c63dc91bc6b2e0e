//! Common error types

use thiserror::Error;

/// A stored or transmitted enum value could not be parsed
#[derive(Error, Debug, Clone)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// What was being parsed (e.g. "subscription status")
    pub kind: &'static str,
    /// The offending input
    pub value: String,
}

impl ParseEnumError {
    /// Create a new parse error
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
