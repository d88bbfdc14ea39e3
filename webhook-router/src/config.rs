use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Verify token used when the configured environment variable is unset.
pub const DEFAULT_VERIFY_TOKEN: &str = "TEST_TOKEN";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Webhook and register paths must differ")]
    DuplicatePath,

    #[error("{0} must be greater than 0")]
    ZeroValue(&'static str),

    #[error("Empty database url")]
    EmptyDatabaseUrl,
}

/// Webhook router configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Public listener serving the webhook ingress and the registration API
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    pub admin_listener: Listener,
    /// Durable store for tenant routes and dead-letter records
    pub storage: StorageConfig,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    /// Largest request body accepted on the public listener
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Config {
    /// Validates the router configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.storage.database_url.trim().is_empty() {
            return Err(ValidationError::EmptyDatabaseUrl);
        }

        self.paths.validate()?;

        if self.forwarding.timeout_ms == 0 {
            return Err(ValidationError::ZeroValue("forwarding.timeout_ms"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ValidationError::ZeroValue("cache.ttl_secs"));
        }
        if self.cache.max_capacity == 0 {
            return Err(ValidationError::ZeroValue("cache.max_capacity"));
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::ZeroValue("max_body_bytes"));
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// sqlx connection string, e.g. `sqlite:///var/lib/central-router/router.db`
    pub database_url: String,
}

/// Request paths served on the public listener
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Paths {
    pub webhook: String,
    pub register: String,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            webhook: "/api/central-router/webhook".into(),
            register: "/api/central-router/register".into(),
        }
    }
}

impl Paths {
    fn validate(&self) -> Result<(), ValidationError> {
        for path in [&self.webhook, &self.register] {
            if !path.starts_with('/') {
                return Err(ValidationError::InvalidPath(path.clone()));
            }
        }
        if self.webhook == self.register {
            return Err(ValidationError::DuplicatePath);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Deadline for each forward to a tenant destination
    pub timeout_ms: u64,
    /// Delay before the first retry of a dead-lettered forward
    pub retry_delay_secs: u64,
    /// How long shutdown waits for in-flight forwards
    pub shutdown_grace_secs: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        ForwardingConfig {
            timeout_ms: 5_000,
            retry_delay_secs: 300,
            shutdown_grace_secs: 30,
        }
    }
}

impl ForwardingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 60,
            max_capacity: 100_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Names of the environment variables holding the platform secrets.
///
/// The values themselves never appear in the config file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecretsConfig {
    pub verify_token_env: String,
    pub app_secret_env: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        SecretsConfig {
            verify_token_env: "FACEBOOK_VERIFY_TOKEN".into(),
            app_secret_env: "FACEBOOK_APP_SECRET".into(),
        }
    }
}

impl SecretsConfig {
    /// Reads the secrets from the process environment.
    pub fn resolve(&self) -> Secrets {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let verify_token = read(&self.verify_token_env).unwrap_or_else(|| {
            tracing::warn!(
                env = %self.verify_token_env,
                "Verify token not set, falling back to the development token"
            );
            DEFAULT_VERIFY_TOKEN.to_string()
        });

        let app_secret = read(&self.app_secret_env);
        if app_secret.is_none() {
            tracing::warn!(
                env = %self.app_secret_env,
                "App secret not set, webhook signatures will not be verified"
            );
        }

        Secrets {
            verify_token,
            app_secret,
        }
    }
}

/// Platform secrets resolved at startup
#[derive(Clone)]
pub struct Secrets {
    pub verify_token: String,
    pub app_secret: Option<String>,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}
