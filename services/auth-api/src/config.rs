//! Configuration for the Auth API service.

use std::str::FromStr;
use std::time::Duration;

use warden_auth_core::{AuthConfig, CountingMode, LockoutPolicy};
use warden_isolation::IsolationConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Auth API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,

    /// Database URL; in-memory stores are used without one
    pub database_url: Option<String>,

    /// Auth core configuration
    pub auth: AuthConfig,

    /// Tenant isolation mode
    pub isolation: IsolationConfig,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Retention sweep interval
    pub cleanup_interval: Duration,

    /// How long login attempts are kept
    pub attempt_retention: Duration,

    /// How long background tasks get to finish on shutdown
    pub shutdown_grace: Duration,

    /// Metrics enabled
    pub metrics_enabled: bool,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let http_port = env.parse_or("HTTP_PORT", 8080)?;

        // Signing secret (minimum 32 bytes)
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid("JWT_SECRET must be at least 32 bytes"));
        }
        let issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "warden".to_string());

        let tiers = match lookup("LOCKOUT_TIERS") {
            Some(raw) => LockoutPolicy::parse_tiers(&raw)
                .map_err(|e| ConfigError::AuthConfig(e.to_string()))?,
            None => LockoutPolicy::default().tiers().to_vec(),
        };
        let counting = match lookup("LOCKOUT_COUNTING").as_deref() {
            None | Some("cumulative") => CountingMode::CumulativeUntilSuccess,
            Some("sliding") => {
                CountingMode::SlidingWindow(env.secs_or("LOCKOUT_WINDOW_SECS", 3600)?)
            }
            Some(_) => return Err(ConfigError::Invalid("LOCKOUT_COUNTING")),
        };
        let lockout = LockoutPolicy::new(tiers, counting)
            .map_err(|e| ConfigError::AuthConfig(e.to_string()))?;

        let mut auth = AuthConfig::new(jwt_secret, issuer)
            .with_access_token_ttl(env.secs_or("ACCESS_TOKEN_TTL_SECS", 1800)?)
            .with_refresh_token_ttl(env.secs_or("REFRESH_TOKEN_TTL_SECS", 2_592_000)?)
            .with_lockout(lockout)
            .with_membership_cache_ttl(env.secs_or("MEMBERSHIP_CACHE_TTL_SECS", 15)?)
            .with_io_timeout(env.secs_or("IO_TIMEOUT_SECS", 5)?);
        if let Some(pepper) = lookup("PASSWORD_PEPPER").filter(|p| !p.is_empty()) {
            auth = auth.with_password_pepper(pepper);
        }
        auth.validate()
            .map_err(|e| ConfigError::AuthConfig(e.to_string()))?;

        let isolation = IsolationConfig::default()
            .with_strict(env.parse_or("ISOLATION_STRICT", true)?)
            .with_warn_on_missing(env.parse_or("ISOLATION_WARN_ON_MISSING", true)?)
            .with_bypass_allowed(env.parse_or("ISOLATION_BYPASS_ALLOWED", false)?);

        let retention_days: u64 = env.parse_or("LOGIN_ATTEMPT_RETENTION_DAYS", 30)?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        Ok(Self {
            http_port,
            database_url,
            auth,
            isolation,
            request_timeout: env.secs_or("REQUEST_TIMEOUT_SECS", 30)?,
            cleanup_interval: env.secs_or("CLEANUP_INTERVAL_SECS", 3600)?,
            attempt_retention: Duration::from_secs(retention_days * 24 * 3600),
            shutdown_grace: env.secs_or("SHUTDOWN_GRACE_SECS", 10)?,
            metrics_enabled: env.parse_or("METRICS_ENABLED", true)?,
            log_format,
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(key) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        }
    }

    fn secs_or(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or(key, default).map(Duration::from_secs)
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Auth config error: {0}")]
    AuthConfig(String),
}
