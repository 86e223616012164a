//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront API (e.g. `http://127.0.0.1:8000/api/v1`)
//!
//! ## Optional
//! - `SHOPFRONT_TOKEN_PATH` - Where the session token is kept (default: `$HOME/.shopfront/session.json`)
//! - `SHOPFRONT_PAGE_SIZE` - Products per listing page (default: 8)
//! - `SHOPFRONT_CATEGORY_TTL_SECS` - How long categories stay cached (default: 1800)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_PAGE_SIZE: u32 = 8;
const DEFAULT_CATEGORY_TTL_SECS: u64 = 30 * 60;
const TOKEN_FILE: &str = ".shopfront/session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront API
    pub api_url: Url,
    /// Path of the persisted session token
    pub token_path: PathBuf,
    /// Products requested per listing page
    pub page_size: u32,
    /// Category cache lifetime
    pub category_ttl: Duration,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            token_path: PathBuf::from(TOKEN_FILE),
            page_size: DEFAULT_PAGE_SIZE,
            category_ttl: Duration::from_secs(DEFAULT_CATEGORY_TTL_SECS),
            request_timeout: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_url = env.required("SHOPFRONT_API_URL")?;
        let api_url = Url::parse(&api_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e.to_string())
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_API_URL".to_string(),
                format!("unsupported scheme: {}", api_url.scheme()),
            ));
        }

        let token_path = match env.optional("SHOPFRONT_TOKEN_PATH") {
            Some(path) => PathBuf::from(path),
            None => env
                .optional("HOME")
                .map(|home| PathBuf::from(home).join(TOKEN_FILE))
                .ok_or_else(|| ConfigError::MissingEnvVar("SHOPFRONT_TOKEN_PATH".to_string()))?,
        };

        let page_size: u32 = env.parsed_or("SHOPFRONT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let category_ttl = Duration::from_secs(
            env.parsed_or("SHOPFRONT_CATEGORY_TTL_SECS", DEFAULT_CATEGORY_TTL_SECS)?,
        );

        let request_timeout = env
            .optional("SHOPFRONT_REQUEST_TIMEOUT_SECS")
            .map(|value| parse_var::<u64>("SHOPFRONT_REQUEST_TIMEOUT_SECS", &value))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            api_url,
            token_path,
            page_size,
            category_ttl,
            request_timeout,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Parse a variable, falling back to a default when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map_or(Ok(default), |value| parse_var(key, &value))
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
