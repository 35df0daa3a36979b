//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BAZAAR_BASE_URL` - Public URL of the API (`https://` enables secure cookies)
//! - `BAZAAR_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 3000)
//! - `BAZAAR_IDLE_TIMEOUT_MINUTES` - Tracked session idle timeout (default: 30)
//! - `BAZAAR_SESSION_MAX_AGE_HOURS` - Tracked session max age (default: 12)
//! - `BAZAAR_LOG_JSON` - Emit JSON logs when set
//! - `SET_CLAIMS_SECRET` - Shared secret accepted by `POST /set-claims`
//! - `IDENTITY_API_BASE` - Identity provider base URL
//!   (default: <https://identitytoolkit.googleapis.com>)
//! - `IDENTITY_PROJECT_ID` - Identity provider project id
//! - `IDENTITY_API_KEY` - Identity provider web API key (token lookups)
//! - `IDENTITY_ADMIN_TOKEN` - Bearer token for the identity admin API
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use bazaar_core::{InactivityPolicy, PolicyError};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_IDENTITY_API_BASE: &str = "https://identitytoolkit.googleapis.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
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

/// Marketplace server configuration.
#[derive(Debug, Clone)]
pub struct BazaarConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Session secret
    pub session_secret: SecretString,
    /// Inactivity rules for tracked login sessions
    pub session_policy: InactivityPolicy,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Custom-claims endpoint configuration
    pub claims: ClaimsConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Configuration for `POST /set-claims` and the identity provider admin API.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ClaimsConfig {
    /// Shared secret accepted in the `X-Admin-Secret` header
    pub shared_secret: Option<SecretString>,
    /// Identity provider REST base URL
    pub api_base: Url,
    pub project_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub admin_token: Option<SecretString>,
}

impl std::fmt::Debug for ClaimsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ClaimsConfig")
            .field("shared_secret", &redact(&self.shared_secret))
            .field("api_base", &self.api_base.as_str())
            .field("project_id", &self.project_id)
            .field("api_key", &redact(&self.api_key))
            .field("admin_token", &redact(&self.admin_token))
            .finish()
    }
}

impl ClaimsConfig {
    /// Whether the identity provider admin API is configured.
    #[must_use]
    pub const fn provider_configured(&self) -> bool {
        self.project_id.is_some() && self.admin_token.is_some()
    }
}

impl BazaarConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BAZAAR_DATABASE_URL")?;
        let host = parse_env("BAZAAR_HOST", "127.0.0.1")?;
        let port = parse_env("BAZAAR_PORT", "3000")?;
        let base_url = get_required_env("BAZAAR_BASE_URL")?;
        let session_secret = get_validated_secret("BAZAAR_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "BAZAAR_SESSION_SECRET")?;

        let session_policy = session_policy(
            parse_env("BAZAAR_IDLE_TIMEOUT_MINUTES", "30")?,
            parse_env("BAZAAR_SESSION_MAX_AGE_HOURS", "12")?,
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            session_policy,
            log_json: get_optional_env("BAZAAR_LOG_JSON").is_some(),
            claims: ClaimsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ClaimsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let shared_secret = match get_optional_env("SET_CLAIMS_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "SET_CLAIMS_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        let api_base = get_env_or_default("IDENTITY_API_BASE", DEFAULT_IDENTITY_API_BASE);
        let api_base = Url::parse(&api_base).map_err(|e| {
            ConfigError::InvalidEnvVar("IDENTITY_API_BASE".to_string(), e.to_string())
        })?;

        Ok(Self {
            shared_secret,
            api_base,
            project_id: get_optional_env("IDENTITY_PROJECT_ID"),
            api_key: get_optional_env("IDENTITY_API_KEY").map(SecretString::from),
            admin_token: get_optional_env("IDENTITY_ADMIN_TOKEN").map(SecretString::from),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

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

fn session_policy(idle_minutes: i64, max_age_hours: i64) -> Result<InactivityPolicy, ConfigError> {
    InactivityPolicy::from_limits(idle_minutes, max_age_hours).map_err(|e| {
        let key = match e {
            PolicyError::IdleTimeout(_) => "BAZAAR_IDLE_TIMEOUT_MINUTES",
            PolicyError::MaxAge(_) => "BAZAAR_SESSION_MAX_AGE_HOURS",
        };
        ConfigError::InvalidEnvVar(key.to_string(), e.to_string())
    })
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn claims_config() -> ClaimsConfig {
        ClaimsConfig {
            shared_secret: Some(SecretString::from("shared-claims-value")),
            api_base: Url::parse(DEFAULT_IDENTITY_API_BASE).unwrap(),
            project_id: Some("bazaar-prod".to_string()),
            api_key: Some(SecretString::from("web-api-key-value")),
            admin_token: None,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("zzzzzz") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("put-your-secret-here", "SET_CLAIMS_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(ref var, _) if var == "SET_CLAIMS_SECRET"));
        assert!(validate_secret_strength("changeme-now", "X").is_err());
    }

    #[test]
    fn test_validate_secret_strength_rejects_low_entropy() {
        assert!(validate_secret_strength(&"ab".repeat(20), "X").is_err());
    }

    #[test]
    fn test_validate_secret_strength_accepts_random() {
        assert!(validate_secret_strength("Qm7$kP2!vX9@tL4#wN8&zR1*", "X").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("k".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_session_policy_limits() {
        let policy = session_policy(45, 8).unwrap();
        assert_eq!(policy.idle_timeout, chrono::Duration::minutes(45));
        assert_eq!(policy.max_age, chrono::Duration::hours(8));

        assert!(matches!(
            session_policy(0, 12),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BAZAAR_IDLE_TIMEOUT_MINUTES"
        ));
        assert!(matches!(
            session_policy(30, i64::MAX),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BAZAAR_SESSION_MAX_AGE_HOURS"
        ));
    }

    #[test]
    fn test_claims_config_debug_redacts_secrets() {
        let output = format!("{:?}", claims_config());
        assert!(output.contains("bazaar-prod"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("shared-claims-value"));
        assert!(!output.contains("web-api-key-value"));
    }

    #[test]
    fn test_provider_configured_needs_project_and_token() {
        let mut config = claims_config();
        assert!(!config.provider_configured());
        config.admin_token = Some(SecretString::from("ya29.token"));
        assert!(config.provider_configured());
    }
}
