//! Configuration for the SOAP/HTTP transport.
//!
//! The transport owns everything about *how* a DSML document reaches the server: request
//! timeout, connection pooling, TLS verification and the user agent. Which server is
//! addressed and with which credentials is part of the directory environment, not of this
//! configuration.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout for pooled connections in seconds
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Default `User-Agent` header
pub const DEFAULT_USER_AGENT: &str = concat!("dsml-core/", env!("CARGO_PKG_VERSION"));

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransportConfig {
    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Idle timeout for pooled connections in seconds
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per host
    #[validate(range(max = 1000))]
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Value of the `User-Agent` header
    #[validate(length(min = 1))]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_pool_idle_timeout() -> u64 {
    DEFAULT_POOL_IDLE_TIMEOUT
}

const fn default_pool_max_idle() -> usize {
    DEFAULT_POOL_MAX_IDLE_PER_HOST
}

const fn default_tls_verify() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl TransportConfig {
    /// Create a transport configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
            tls_verify: default_tls_verify(),
            user_agent: default_user_agent(),
        }
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the connection pool idle timeout in seconds.
    #[must_use]
    pub const fn with_pool_idle_timeout_secs(mut self, seconds: u64) -> Self {
        self.pool_idle_timeout_secs = seconds;
        self
    }

    /// Set the maximum number of idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pool idle timeout as a [`Duration`].
    #[must_use]
    pub const fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing every invalid field.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid transport configuration: {e}")))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}
