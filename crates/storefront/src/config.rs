//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (redirect and image URLs)
//! - `STRIPE_SECRET_KEY` - Payment provider API key
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Outgoing mail relay
//! - `EMAIL_FROM` - Sender address for order emails
//! - `ADMIN_NOTIFICATION_EMAIL` - Where new-order notifications go
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STRIPE_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_CURRENCY` - Charge currency (default: usd)
//! - `STRIPE_WEBHOOK_TOLERANCE_SECS` - Max webhook timestamp age (default: 300)
//! - `STRIPE_REQUEST_TIMEOUT_SECS` - Provider request timeout (default: 30)
//! - `CHECKOUT_ALLOWED_COUNTRIES` - Comma-separated shipping countries (default: US,CA,GB)
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `OUTBOX_POLL_INTERVAL_SECS` - Email outbox poll interval (default: 15)
//! - `OUTBOX_MAX_ATTEMPTS` - Delivery attempts before giving up (default: 8)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use boho_core::{CurrencyCode, Email};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Payment provider configuration
    pub stripe: StripeConfig,
    /// Hosted checkout options
    pub checkout: CheckoutConfig,
    /// Outgoing email configuration
    pub email: EmailConfig,
    /// Notification outbox worker configuration
    pub outbox: OutboxConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API base URL (overridable for a local mock)
    pub api_base: String,
    /// Secret API key used for provider calls
    pub secret_key: SecretString,
    /// Shared secret for webhook signatures
    pub webhook_secret: SecretString,
    /// Currency all prices are charged in
    pub currency: CurrencyCode,
    /// Maximum accepted age of a webhook signature timestamp
    pub webhook_tolerance: Duration,
    /// Timeout for each provider request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("webhook_tolerance", &self.webhook_tolerance)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Hosted checkout session options.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Two-letter country codes accepted for shipping
    pub allowed_countries: Vec<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            allowed_countries: vec!["US".to_string(), "CA".to_string(), "GB".to_string()],
        }
    }
}

/// SMTP and notification addresses.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Sender for all outgoing mail, e.g. `Boho Baha <orders@bohobaha.com>`
    pub from_address: String,
    /// Recipient of new-order notifications
    pub admin_address: Email,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("admin_address", &self.admin_address)
            .finish()
    }
}

/// Email outbox delivery settings.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// How often the worker looks for due messages when not woken
    pub poll_interval: Duration,
    /// Attempts before a message is marked failed
    pub max_attempts: u32,
    /// Messages claimed per batch
    pub batch_size: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            max_attempts: 8,
            batch_size: 10,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = normalize_base_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            stripe: StripeConfig::from_env()?,
            checkout: CheckoutConfig::from_env(),
            email: EmailConfig::from_env()?,
            outbox: OutboxConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("STRIPE_CURRENCY", "usd");
        let currency = CurrencyCode::from_str(&currency)
            .map_err(|e| ConfigError::InvalidEnvVar("STRIPE_CURRENCY".to_string(), e))?;

        Ok(Self {
            api_base: normalize_base_url(
                "STRIPE_API_BASE",
                &get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
            )?,
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            currency,
            webhook_tolerance: Duration::from_secs(parse_env_or_default(
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                "300",
            )?),
            request_timeout: Duration::from_secs(parse_env_or_default(
                "STRIPE_REQUEST_TIMEOUT_SECS",
                "30",
            )?),
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Self {
        get_optional_env("CHECKOUT_ALLOWED_COUNTRIES").map_or_else(Self::default, |raw| Self {
            allowed_countries: parse_country_list(&raw),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let admin_address = Email::parse(&get_required_env("ADMIN_NOTIFICATION_EMAIL")?)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ADMIN_NOTIFICATION_EMAIL".to_string(), e.to_string())
            })?;

        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: parse_env_or_default("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
            admin_address,
        })
    }
}

impl OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            poll_interval: Duration::from_secs(parse_env_or_default(
                "OUTBOX_POLL_INTERVAL_SECS",
                "15",
            )?),
            max_attempts: parse_env_or_default("OUTBOX_MAX_ATTEMPTS", "8")?,
            batch_size: defaults.batch_size,
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

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate an absolute http(s) URL and strip any trailing slash.
fn normalize_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Split `"us, ca,GB"` into `["US", "CA", "GB"]`.
fn parse_country_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
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

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
