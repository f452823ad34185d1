//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BOOKSTALL_DATABASE_URL` - `PostgreSQL` connection string
//! - `BOOKSTALL_BASE_URL` - Public URL for the API
//! - `BOOKSTALL_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BOOKSTALL_HOST` - Bind address (default: 127.0.0.1)
//! - `BOOKSTALL_PORT` - Listen port (default: 3000)
//! - `BOOKSTALL_SHIPPING_FLAT_RATE` - Flat shipping cost added to every order
//!   total (default: 0). Shipping policy lives here, not in the checkout engine.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bookstall server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the API
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Flat shipping cost added to every order total
    pub shipping_flat_rate: Decimal,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, malformed, or
    /// the session secret fails the strength checks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require_env("BOOKSTALL_DATABASE_URL").map(SecretString::from)?;
        let base_url = require_env("BOOKSTALL_BASE_URL")?;

        let session_secret = require_env("BOOKSTALL_SESSION_SECRET")?;
        validate_secret("BOOKSTALL_SESSION_SECRET", &session_secret)?;
        let session_secret = SecretString::from(session_secret);

        let host = optional_env("BOOKSTALL_HOST")
            .unwrap_or_else(|| "127.0.0.1".to_owned())
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BOOKSTALL_HOST".to_owned(), e.to_string()))?;

        let port = optional_env("BOOKSTALL_PORT")
            .unwrap_or_else(|| "3000".to_owned())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BOOKSTALL_PORT".to_owned(), e.to_string()))?;

        let shipping_flat_rate = optional_env("BOOKSTALL_SHIPPING_FLAT_RATE")
            .unwrap_or_else(|| "0".to_owned())
            .parse::<Decimal>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BOOKSTALL_SHIPPING_FLAT_RATE".to_owned(), e.to_string())
            })?;

        if shipping_flat_rate < Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "BOOKSTALL_SHIPPING_FLAT_RATE".to_owned(),
                "shipping rate cannot be negative".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            shipping_flat_rate,
            sentry_dsn: optional_env("SENTRY_DSN"),
            sentry_environment: optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Socket address to bind the listener to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS (drives the session
    /// cookie's `Secure` flag).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Reject secrets that are too short, look like placeholders, or have low
/// character diversity.
fn validate_secret(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("must be at least {MIN_SESSION_SECRET_LENGTH} characters"),
        ));
    }

    let lowered = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lowered.contains(**p)) {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("looks like a placeholder (contains {pattern:?})"),
        ));
    }

    if shannon_entropy_per_char(value) < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            "low entropy, use a randomly generated value".to_owned(),
        ));
    }

    Ok(())
}

/// Shannon entropy in bits per character.
#[allow(clippy::cast_precision_loss)]
fn shannon_entropy_per_char(value: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    let len = value.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}
