//! Checkout engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VERDON_API_BASE_URL` - Base URL of the commerce platform API
//! - `VERDON_SESSION_COOKIE` - Session cookie value for the current customer
//!
//! ## Optional
//! - `VERDON_REQUEST_TIMEOUT_SECS` - HTTP timeout for quote/submit calls
//!   (default: 15)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default HTTP timeout for shipping-quote and submission calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Checkout engine configuration.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct CheckoutConfig {
    /// Base URL of the commerce platform API.
    pub api_base_url: Url,
    /// Session cookie value authenticating the current customer.
    pub session_cookie: SecretString,
    /// HTTP timeout applied to every API call.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("session_cookie", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = get_required_env("VERDON_API_BASE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("VERDON_API_BASE_URL".to_string(), e.to_string())
            })?;
        let session_cookie = get_required_secret("VERDON_SESSION_COOKIE")?;
        let request_timeout = get_env_or_default(
            "VERDON_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT.as_secs().to_string(),
        )
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("VERDON_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_base_url,
            session_cookie,
            request_timeout,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
