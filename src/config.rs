//! Configuration and settings management
//!
//! Loads settings from environment variables and defines runtime constants.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Telegram user id of the bot owner
    pub owner_id: i64,

    /// Optional proxy URL for outbound HTTP requests
    pub requests_proxy: Option<String>,

    /// Imgur application client id
    pub imgur_client_id: String,
    /// Imgur application client secret
    pub imgur_client_secret: String,
    /// Imgur OAuth refresh token
    pub imgur_refresh_token: String,
    /// Album to file uploads under, if any
    pub imgur_album_id: Option<String>,

    /// Path to a JSON snapshot of the user registry
    pub users_file: Option<String>,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Also add settings from environment variables directly
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

/// Total attempts for a rate-limited outbound call before giving up.
/// The original relayed bot retried without a cap; this one does not.
pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;

/// Pause between consecutive broadcast sends, keeps us under flood limits
pub const BROADCAST_PACING_MS: u64 = 50;

/// Timeout for Imgur API calls
pub const IMGUR_HTTP_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn set_required_env() {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("OWNER_ID", "42");
        env::set_var("IMGUR_CLIENT_ID", "cid");
        env::set_var("IMGUR_CLIENT_SECRET", "csecret");
        env::set_var("IMGUR_REFRESH_TOKEN", "rtoken");
    }

    fn clear_env() {
        for key in [
            "TELEGRAM_TOKEN",
            "OWNER_ID",
            "IMGUR_CLIENT_ID",
            "IMGUR_CLIENT_SECRET",
            "IMGUR_REFRESH_TOKEN",
            "IMGUR_ALBUM_ID",
            "REQUESTS_PROXY",
            "USERS_FILE",
        ] {
            env::remove_var(key);
        }
    }

    // Runs env scenarios in one test to avoid environment variable races
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        // 1. Required fields only, optionals stay unset
        set_required_env();

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.owner_id, 42);
        assert_eq!(settings.imgur_album_id, None);
        assert_eq!(settings.requests_proxy, None);

        // 2. Optional fields picked up
        env::set_var("IMGUR_ALBUM_ID", "alb123");
        env::set_var("REQUESTS_PROXY", "socks5://127.0.0.1:9050");

        let settings = Settings::new()?;
        assert_eq!(settings.imgur_album_id, Some("alb123".to_string()));
        assert_eq!(
            settings.requests_proxy,
            Some("socks5://127.0.0.1:9050".to_string())
        );

        // 3. Empty env var treated as unset
        env::set_var("IMGUR_ALBUM_ID", "");

        let settings = Settings::new()?;
        assert_eq!(settings.imgur_album_id, None);

        clear_env();
        Ok(())
    }
}
