//! Configuration management for the tasklist client.
//!
//! Loads configuration from environment variables with defaults matching the
//! hosted students API.

use crate::client::DEFAULT_API_URL;
use crate::error::ConfigError;
use crate::reducer::DEFAULT_ERROR_DISPLAY_MS;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tasklist_runtime::StoreConfig;

/// User id the hosted API was provisioned for
pub const DEFAULT_USER_ID: u64 = 2272;

/// Default time [`TodoApp::shutdown`](crate::TodoApp::shutdown) waits for
/// requests in flight, in milliseconds
///
/// Longer than the error display time, since a pending dismissal counts as
/// in flight.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Client configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote todo store (`TASKLIST_API_URL`)
    pub api_url: String,
    /// Owner of the todos (`TASKLIST_USER_ID`); 0 is not a valid user
    pub user_id: u64,
    /// How long an error stays visible, in milliseconds (`TASKLIST_ERROR_DISPLAY_MS`)
    pub error_display_ms: u64,
    /// How long shutdown waits for requests in flight, in milliseconds (`TASKLIST_SHUTDOWN_TIMEOUT_MS`)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional; unset or unparsable values fall back to
    /// their defaults. Call [`validate`](Self::validate) before use.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            api_url: lookup("TASKLIST_API_URL").unwrap_or(defaults.api_url),
            user_id: lookup("TASKLIST_USER_ID")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.user_id),
            error_display_ms: lookup("TASKLIST_ERROR_DISPLAY_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.error_display_ms),
            shutdown_timeout_ms: lookup("TASKLIST_SHUTDOWN_TIMEOUT_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.shutdown_timeout_ms),
        }
    }

    /// Check that the configuration can be used
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingUserId`]: the user id is 0
    /// - [`ConfigError::InvalidApiUrl`]: the base URL is empty or not http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_id == 0 {
            return Err(ConfigError::MissingUserId);
        }

        let url = self.api_url.trim();
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }

        Ok(())
    }

    /// Set the base URL of the remote todo store
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set the user id
    #[must_use]
    pub const fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Set how long an error stays visible
    #[must_use]
    pub const fn with_error_display_ms(mut self, error_display_ms: u64) -> Self {
        self.error_display_ms = error_display_ms;
        self
    }

    /// Set how long shutdown waits for requests in flight
    #[must_use]
    pub const fn with_shutdown_timeout_ms(mut self, shutdown_timeout_ms: u64) -> Self {
        self.shutdown_timeout_ms = shutdown_timeout_ms;
        self
    }

    /// The configured user
    #[must_use]
    pub const fn user(&self) -> UserId {
        UserId::new(self.user_id)
    }

    /// How long an error stays visible
    #[must_use]
    pub const fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    /// Store settings derived from this configuration
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_shutdown_timeout(Duration::from_millis(self.shutdown_timeout_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_id: DEFAULT_USER_ID,
            error_display_ms: DEFAULT_ERROR_DISPLAY_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));

        assert_eq!(config, Config::default());
        assert_eq!(config.api_url, "https://mate.academy/students-api");
        assert_eq!(config.user(), UserId::new(2272));
        assert_eq!(config.error_display(), Duration::from_millis(3000));
        assert_eq!(
            config.store_config().default_shutdown_timeout,
            Duration::from_secs(10)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TASKLIST_API_URL", "http://localhost:8080"),
            ("TASKLIST_USER_ID", " 7 "),
            ("TASKLIST_ERROR_DISPLAY_MS", "500"),
            ("TASKLIST_SHUTDOWN_TIMEOUT_MS", "2500"),
        ]));

        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.user_id, 7);
        assert_eq!(config.error_display(), Duration::from_millis(500));
        assert_eq!(
            config.store_config().default_shutdown_timeout,
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_unparsable_value_uses_default() {
        let config = Config::from_lookup(lookup(&[("TASKLIST_USER_ID", "me")]));
        assert_eq!(config.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn test_validate_rejects_zero_user() {
        let config = Config::default().with_user_id(0);
        assert_eq!(config.validate(), Err(ConfigError::MissingUserId));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config::default().with_api_url("ftp://example.com");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidApiUrl(_))));

        let config = Config::default().with_api_url("  ");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidApiUrl(_))));
    }
}
