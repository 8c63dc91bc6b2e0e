//! Isolation enforcement settings

/// How the guard treats missing context and bypass requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationConfig {
    /// Reject data operations without a tenant context
    pub strict: bool,
    /// Log (and audit) operations that ran without a context
    pub warn_on_missing: bool,
    /// Allow system contexts to request an unscoped store
    pub bypass_allowed: bool,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            strict: true,
            warn_on_missing: true,
            bypass_allowed: false,
        }
    }
}

impl IsolationConfig {
    /// Missing context runs unscoped. Trusted jobs only.
    pub fn permissive() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_warn_on_missing(mut self, warn: bool) -> Self {
        self.warn_on_missing = warn;
        self
    }

    #[must_use]
    pub fn with_bypass_allowed(mut self, allowed: bool) -> Self {
        self.bypass_allowed = allowed;
        self
    }
}
