//! Gate configuration (timeouts and the login entry point).

use chrono::Duration;

use super::verifier::DEFAULT_MAX_CODE_ATTEMPTS;

const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_SESSION_TIMEOUT_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_LOGIN_PATH: &str = "/admin/login";

/// Upper bound for `--code-ttl-seconds`.
pub const MAX_CODE_TTL_SECONDS: i64 = 60 * 60;
/// Upper bound for `--session-timeout-seconds`.
pub const MAX_SESSION_TIMEOUT_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct GateConfig {
    frontend_base_url: String,
    login_path: String,
    code_ttl_seconds: i64,
    session_timeout_seconds: i64,
    max_code_attempts: u32,
}

impl GateConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            session_timeout_seconds: DEFAULT_SESSION_TIMEOUT_SECONDS,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    /// Clamped to `1..=MAX_CODE_TTL_SECONDS`.
    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds.clamp(1, MAX_CODE_TTL_SECONDS);
        self
    }

    /// Clamped to `1..=MAX_SESSION_TIMEOUT_SECONDS`.
    #[must_use]
    pub fn with_session_timeout_seconds(mut self, seconds: i64) -> Self {
        self.session_timeout_seconds = seconds.clamp(1, MAX_SESSION_TIMEOUT_SECONDS);
        self
    }

    #[must_use]
    pub fn with_max_code_attempts(mut self, attempts: u32) -> Self {
        self.max_code_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        Duration::seconds(self.code_ttl_seconds)
    }

    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::seconds(self.session_timeout_seconds)
    }

    #[must_use]
    pub fn session_timeout_seconds(&self) -> i64 {
        self.session_timeout_seconds
    }

    #[must_use]
    pub fn max_code_attempts(&self) -> u32 {
        self.max_code_attempts
    }

    /// Cookies are only marked `Secure` when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}
