//! Service settings
//!
//! Built-in defaults overlaid by `HOMECARE_*` environment variables, e.g.
//! `HOMECARE_BIND_ADDRESS=0.0.0.0:8080` or `HOMECARE_ENVIRONMENT=development`.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::token::DEFAULT_TOKEN_LIFETIME_MS;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Production,
    Development,
}

/// Settings shared by both services
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: RuntimeEnvironment,
    pub bind_address: String,
    pub token_lifetime_ms: i64,
    /// Enables signed tokens when present
    pub token_secret: Option<String>,
    /// Comma separated list of allowed origins, or `*`
    pub cors_origins: String,
    /// Enables SSN storage when present
    pub field_encryption_key: Option<String>,
    /// Base URL of a Nominatim-compatible geocoder
    pub geocoder_url: Option<String>,
    pub login_max_attempts: u32,
    /// Failed logins older than this no longer count
    pub login_window_seconds: u64,
    pub login_lockout_seconds: u64,
}

impl Settings {
    /// Load settings, listening on `default_bind` unless overridden
    pub fn load(default_bind: &str) -> Result<Self> {
        Config::builder()
            .set_default("environment", "production")?
            .set_default("bind_address", default_bind)?
            .set_default("token_lifetime_ms", DEFAULT_TOKEN_LIFETIME_MS)?
            .set_default("cors_origins", "*")?
            .set_default("login_max_attempts", 5_i64)?
            .set_default("login_window_seconds", 300_i64)?
            .set_default("login_lockout_seconds", 900_i64)?
            .add_source(Environment::with_prefix("HOMECARE").try_parsing(true))
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")
    }

    pub fn is_development(&self) -> bool {
        self.environment == RuntimeEnvironment::Development
    }

    /// Allowed CORS origins; `None` means any origin
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn defaults_apply_without_environment() {
        let settings = Settings::load("0.0.0.0:3000").unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:3000");
        assert_eq!(settings.environment, RuntimeEnvironment::Production);
        assert_eq!(settings.token_lifetime_ms, DEFAULT_TOKEN_LIFETIME_MS);
        assert_eq!(settings.login_max_attempts, 5);
        assert_eq!(settings.login_window_seconds, 300);
        assert!(settings.token_secret.is_none());
        assert!(settings.allowed_origins().is_none());
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        unsafe {
            env::set_var("HOMECARE_ENVIRONMENT", "development");
            env::set_var("HOMECARE_TOKEN_LIFETIME_MS", "60000");
            env::set_var(
                "HOMECARE_CORS_ORIGINS",
                "https://app.example.com, https://admin.example.com",
            );
        }

        let settings = Settings::load("0.0.0.0:3000").unwrap();
        assert!(settings.is_development());
        assert_eq!(settings.token_lifetime_ms, 60_000);
        assert_eq!(
            settings.allowed_origins().unwrap(),
            vec!["https://app.example.com", "https://admin.example.com"]
        );

        unsafe {
            env::remove_var("HOMECARE_ENVIRONMENT");
            env::remove_var("HOMECARE_TOKEN_LIFETIME_MS");
            env::remove_var("HOMECARE_CORS_ORIGINS");
        }
    }
}
