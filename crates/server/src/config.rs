//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TROLLEY_REMOTE_URL` - Base URL of the remote cart service
//!   (e.g., <http://localhost:3000>)
//!
//! ## Optional
//! - `TROLLEY_HOST` - Bind address (default: 127.0.0.1)
//! - `TROLLEY_PORT` - Listen port (default: 4000)
//! - `TROLLEY_REMOTE_TIMEOUT_MS` - Per-request timeout against the remote
//!   cart service in milliseconds (default: 5000)
//! - `TROLLEY_REMOTE_TOKEN` - Bearer token sent to the remote cart service
//! - `TROLLEY_CACHE_PATH` - Durable cart cache file (default:
//!   trolley-cart.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry traces sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use trolley_engine::config::{EngineConfig, RemoteConfig};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Trolley server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Base URL of the remote cart service
    pub remote_url: Url,
    /// Per-request timeout for remote cart service calls
    pub remote_timeout: Duration,
    /// Optional bearer token for the remote cart service
    pub remote_token: Option<SecretString>,
    /// Durable cart cache file
    pub cache_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl ServerConfig {
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

        let host = get_env_or_default("TROLLEY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("TROLLEY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("TROLLEY_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("TROLLEY_PORT".to_string(), e.to_string()))?;

        let remote_url = Url::parse(&get_required_env("TROLLEY_REMOTE_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("TROLLEY_REMOTE_URL".to_string(), e.to_string())
        })?;
        let remote_timeout = get_env_or_default("TROLLEY_REMOTE_TIMEOUT_MS", "5000")
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TROLLEY_REMOTE_TIMEOUT_MS".to_string(), e.to_string())
            })?;
        let remote_token = get_optional_env("TROLLEY_REMOTE_TOKEN").map(SecretString::from);

        let cache_path = PathBuf::from(get_env_or_default("TROLLEY_CACHE_PATH", "trolley-cart.json"));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        Ok(Self {
            host,
            port,
            remote_url,
            remote_timeout,
            remote_token,
            cache_path,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The engine's view of this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            remote: RemoteConfig {
                base_url: self.remote_url.clone(),
                timeout: self.remote_timeout,
                bearer_token: self.remote_token.clone(),
            },
            cache_path: self.cache_path.clone(),
        }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            remote_url: Url::parse("http://localhost:3000").unwrap(),
            remote_timeout: Duration::from_millis(5000),
            remote_token: None,
            cache_path: PathBuf::from("trolley-cart.json"),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_engine_config_carries_remote_and_cache_settings() {
        let mut server = config();
        server.remote_timeout = Duration::from_millis(250);
        server.cache_path = PathBuf::from("/var/lib/trolley/cart.json");

        let engine = server.engine_config();

        assert_eq!(engine.remote.base_url.as_str(), "http://localhost:3000/");
        assert_eq!(engine.remote.timeout, Duration::from_millis(250));
        assert!(engine.remote.bearer_token.is_none());
        assert_eq!(engine.cache_path, PathBuf::from("/var/lib/trolley/cart.json"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("TROLLEY_REMOTE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: TROLLEY_REMOTE_URL"
        );
    }
}
