//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VIBEFRONT_ADMIN_TOKEN` - Bearer token for internal endpoints (min 32 chars, high entropy)
//!
//! ## Optional
//! - `VIBEFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `VIBEFRONT_PORT` - Listen port (default: 3000)
//! - `VIBEFRONT_CACHE_TTL_SECS` - Rendered-page cache TTL (default: 300)
//! - `VIBEFRONT_BLOCK_TIME_LIMIT_MS` - Per-block CPU/wall budget (default: 1000)
//! - `VIBEFRONT_BLOCK_MEMORY_LIMIT_MB` - Per-block memory budget (default: 128)
//! - `VIBEFRONT_BLOCK_OUTPUT_LIMIT_KB` - Per-block output cap (default: 1024)
//! - `VIBEFRONT_STORE_TIMEOUT_MS` - Catalog prefetch budget (default: 2000)
//! - `VIBEFRONT_FALLBACK` - Failed-block fallback, `omit` or `placeholder` (default: omit)
//! - `VIBEFRONT_SEED_DEMO` - Seed the in-memory store with demo data (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use vibefront_engine::{ExecLimits, FallbackMode, RenderOptions};

const MIN_ADMIN_TOKEN_LENGTH: usize = 32;
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
    "put-your",
    "add-your",
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

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token guarding `/internal` endpoints
    pub admin_token: SecretString,
    /// Rendered-page cache TTL
    pub cache_ttl: Duration,
    /// Per-block sandbox limits
    pub limits: ExecLimits,
    /// Catalog prefetch budget
    pub store_timeout: Duration,
    /// What a failed block's slot becomes
    pub fallback: FallbackMode,
    /// Seed the in-memory store with demo data on startup
    pub seed_demo: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the admin token fails validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("VIBEFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("VIBEFRONT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("VIBEFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("VIBEFRONT_PORT".to_string(), e.to_string()))?;

        let admin_token = get_required_env("VIBEFRONT_ADMIN_TOKEN")?;
        validate_admin_token(&admin_token, "VIBEFRONT_ADMIN_TOKEN")?;
        validate_secret_strength(&admin_token, "VIBEFRONT_ADMIN_TOKEN")?;

        let cache_ttl = Duration::from_secs(parse_env("VIBEFRONT_CACHE_TTL_SECS", 300)?);
        let store_timeout = Duration::from_millis(parse_env("VIBEFRONT_STORE_TIMEOUT_MS", 2000)?);
        let limits = ExecLimits {
            max_duration: Duration::from_millis(parse_env("VIBEFRONT_BLOCK_TIME_LIMIT_MS", 1000)?),
            max_memory_bytes: parse_env("VIBEFRONT_BLOCK_MEMORY_LIMIT_MB", 128)? * 1024 * 1024,
            max_output_bytes: parse_env("VIBEFRONT_BLOCK_OUTPUT_LIMIT_KB", 1024)? * 1024,
            ..ExecLimits::default()
        };

        let fallback = match get_env_or_default("VIBEFRONT_FALLBACK", "omit").as_str() {
            "omit" => FallbackMode::Omit,
            "placeholder" => FallbackMode::Placeholder,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "VIBEFRONT_FALLBACK".to_string(),
                    format!("expected 'omit' or 'placeholder', got '{other}'"),
                ));
            }
        };

        let seed_demo = get_env_or_default("VIBEFRONT_SEED_DEMO", "true")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("VIBEFRONT_SEED_DEMO".to_string(), e.to_string())
            })?;

        let sentry_sample_rate = get_env_or_default("SENTRY_SAMPLE_RATE", "1.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
            })?;
        let sentry_traces_sample_rate = get_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            host,
            port,
            admin_token: SecretString::from(admin_token),
            cache_ttl,
            limits,
            store_timeout,
            fallback,
            seed_demo,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Render options derived from this configuration.
    #[must_use]
    pub const fn render_options(&self) -> RenderOptions {
        RenderOptions {
            limits: self.limits,
            fallback: self.fallback,
            cache_ttl: self.cache_ttl,
            store_timeout: self.store_timeout,
        }
    }

    /// Constant-time-ish check of a presented bearer token.
    #[must_use]
    pub fn admin_token_matches(&self, presented: &str) -> bool {
        let expected = self.admin_token.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a numeric environment variable with a default.
fn parse_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Validate that the admin token meets minimum length requirements.
fn validate_admin_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_ADMIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_ADMIN_TOKEN_LENGTH,
                token.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config(token: &str) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            admin_token: SecretString::from(token),
            cache_ttl: Duration::from_secs(300),
            limits: ExecLimits::default(),
            store_timeout: Duration::from_secs(2),
            fallback: FallbackMode::Omit,
            seed_demo: true,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-admin-token-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_admin_token_too_short() {
        assert!(validate_admin_token("short", "TEST_TOKEN").is_err());
        assert!(validate_admin_token(&"a".repeat(32), "TEST_TOKEN").is_ok());
    }

    #[test]
    fn test_admin_token_matches() {
        let config = test_config("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6x");
        assert!(config.admin_token_matches("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6x"));
        assert!(!config.admin_token_matches("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6y"));
        assert!(!config.admin_token_matches("wrong"));
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config("x");
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
