//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys
//! use `__` as separator, e.g. `LARK__REDIRECT_URI` or
//! `SESSION__DURATION_MINUTES`.

use lark_login_platform_access::RedirectTargets;
use lark_login_provider::LARK_BASE_URL;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Lark Open API configuration.
    pub lark: LarkConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Landing page after a successful login.
    #[serde(default = "default_landing_path")]
    pub landing_path: String,

    /// Login page that displays `login_error_code`.
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

/// Lark Open API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LarkConfig {
    /// Base URL of the Lark Open API.
    #[serde(default = "default_lark_base_url")]
    pub base_url: String,

    /// Callback URL registered with the Lark app.
    pub redirect_uri: String,

    /// Timeout for each outbound request, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// How long the app access token is reused, in seconds.
    #[serde(default = "default_app_token_ttl_seconds")]
    pub app_token_ttl_seconds: u64,
}

impl LarkConfig {
    /// Returns the outbound request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Returns the app access token cache lifetime.
    #[must_use]
    pub fn app_token_ttl(&self) -> Duration {
        Duration::from_secs(self.app_token_ttl_seconds)
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

impl SessionConfig {
    /// Returns the session duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }

    /// Returns the interval between session cleanup runs, at least one second.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_landing_path() -> String {
    "/helpdesk".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_lark_base_url() -> String {
    LARK_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_app_token_ttl_seconds() -> u64 {
    6000
}

fn default_session_duration_minutes() -> i64 {
    480
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(None)
    }

    /// Loads configuration from `vars` instead of the process environment
    /// when given.
    fn from_source(vars: Option<config::Map<String, String>>) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the callback redirect targets.
    #[must_use]
    pub fn redirect_targets(&self) -> RedirectTargets {
        RedirectTargets {
            landing_path: self.landing_path.clone(),
            login_path: self.login_path.clone(),
        }
    }
}
