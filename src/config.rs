//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::time::Duration;

/// Placeholder returned for string settings that are unset or empty.
pub const EMPTY_ENV_VAR: &str = "emptyEnvVar";

/// Default idle window for cached collections (serverless idle timeout).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with empty-safe defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment (DEV, STAGING, PRODUCTION, TEST, LOCAL)
    pub api_env: String,
    /// Document store endpoint (`memory://...` or `file://<dir>`)
    pub db_connection_string: String,
    /// Database name inside the document store
    pub db_name: String,
    /// Whether repositories serve reads from the cache
    pub cache_enabled: bool,
    /// Idle TTL in seconds for cached entries
    pub cache_ttl: u64,
    /// Expiry sweep period in seconds
    pub cache_check_period: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `API_ENV` - Deployment environment (default: DEV)
    /// - `DB_CONNECTION_STRING` - Document store endpoint (default: `emptyEnvVar`)
    /// - `DB_NAME` - Database name (default: `emptyEnvVar`)
    /// - `CACHE_ENABLED` - Serve reads from cache (default: true)
    /// - `CACHE_TTL` - Idle TTL in seconds (default: 300)
    /// - `CACHE_CHECK_PERIOD` - Sweep period in seconds (default: TTL / 5)
    /// - `SERVER_PORT` - HTTP server port (default: 7071)
    pub fn from_env() -> Self {
        let cache_ttl = parsed_var("CACHE_TTL").unwrap_or(DEFAULT_CACHE_TTL_SECS);

        Self {
            api_env: string_var("API_ENV", Some("DEV")),
            db_connection_string: string_var("DB_CONNECTION_STRING", None),
            db_name: string_var("DB_NAME", None),
            cache_enabled: parsed_var("CACHE_ENABLED").unwrap_or(true),
            cache_ttl,
            cache_check_period: parsed_var("CACHE_CHECK_PERIOD")
                .unwrap_or_else(|| default_check_period(cache_ttl)),
            server_port: parsed_var("SERVER_PORT").unwrap_or(7071),
        }
    }

    /// Debug logging is only enabled for non-production environments.
    pub fn env_is_debuggable(&self) -> bool {
        matches!(self.api_env.as_str(), "DEV" | "TEST" | "LOCAL")
    }

    /// Cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// Sweep period as a Duration, never shorter than one second.
    pub fn cache_check_period(&self) -> Duration {
        Duration::from_secs(self.cache_check_period.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_env: "DEV".to_string(),
            db_connection_string: EMPTY_ENV_VAR.to_string(),
            db_name: EMPTY_ENV_VAR.to_string(),
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            cache_check_period: default_check_period(DEFAULT_CACHE_TTL_SECS),
            server_port: 7071,
        }
    }
}

fn default_check_period(ttl: u64) -> u64 {
    (ttl / 5).max(1)
}

fn string_var(name: &str, fallback: Option<&str>) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| EMPTY_ENV_VAR.to_string())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_env, "DEV");
        assert_eq!(config.db_connection_string, EMPTY_ENV_VAR);
        assert_eq!(config.db_name, EMPTY_ENV_VAR);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, 300);
        assert_eq!(config.cache_check_period, 60);
        assert_eq!(config.server_port, 7071);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("API_ENV");
        env::remove_var("DB_CONNECTION_STRING");
        env::remove_var("DB_NAME");
        env::remove_var("CACHE_ENABLED");
        env::remove_var("CACHE_TTL");
        env::remove_var("CACHE_CHECK_PERIOD");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.api_env, "DEV");
        assert_eq!(config.db_connection_string, EMPTY_ENV_VAR);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_check_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_debuggable_environments() {
        let mut config = Config::default();
        assert!(config.env_is_debuggable());

        config.api_env = "PRODUCTION".to_string();
        assert!(!config.env_is_debuggable());

        config.api_env = "LOCAL".to_string();
        assert!(config.env_is_debuggable());
    }

    #[test]
    fn test_check_period_floor() {
        assert_eq!(default_check_period(3), 1);
        assert_eq!(default_check_period(300), 60);
    }
}
