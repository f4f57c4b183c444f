//! Calling service client configuration.
//!
//! Configuration is loaded from environment variables. The basic-auth
//! password is held as a `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default basic-auth user of the calling service.
pub const DEFAULT_BASIC_AUTH_USER: &str = "qa";

/// Shards behind the calling service load balancer.
pub const DEFAULT_SHARDS: [&str; 4] = ["c1", "c2", "c3", "c4"];

/// Name of the load balancer's sticky-session cookie.
pub const DEFAULT_STICKY_COOKIE: &str = "SERVERID";

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Default request timeout in seconds.
///
/// The calling service gives up on instance start after 180 seconds; the
/// extra 10 seconds let the client observe that response instead of timing
/// out first.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 190;

/// Calling service client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the calling service (e.g. "https://callingservice.example.com").
    pub base_url: String,

    /// Basic-auth user.
    pub basic_auth_user: String,

    /// Basic-auth password.
    pub basic_auth_password: SecretString,

    /// Shard ids enumerated by fleet discovery.
    pub shards: Vec<String>,

    /// Name of the sticky-session cookie issued by the load balancer.
    pub sticky_cookie_name: String,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Whole-request timeout.
    pub request_timeout: Duration,

    /// Log request and response bodies without truncation.
    pub verbose_logging: bool,
}

/// Custom Debug implementation that redacts the password.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("basic_auth_user", &self.basic_auth_user)
            .field("basic_auth_password", &"[REDACTED]")
            .field("shards", &self.shards)
            .field("sticky_cookie_name", &self.sticky_cookie_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("verbose_logging", &self.verbose_logging)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid calling service URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid shard list: {0}")]
    InvalidShards(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid verbose logging flag: {0}")]
    InvalidVerbose(String),
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the endpoint
    /// and password.
    #[must_use]
    pub fn new(base_url: impl Into<String>, basic_auth_password: SecretString) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            basic_auth_user: DEFAULT_BASIC_AUTH_USER.to_string(),
            basic_auth_password,
            shards: DEFAULT_SHARDS.iter().map(ToString::to_string).collect(),
            sticky_cookie_name: DEFAULT_STICKY_COOKIE.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            verbose_logging: false,
        }
    }

    /// Set the basic-auth user.
    #[must_use]
    pub fn with_basic_auth_user(mut self, user: impl Into<String>) -> Self {
        self.basic_auth_user = user.into();
        self
    }

    /// Set the shard ids used by fleet discovery.
    #[must_use]
    pub fn with_shards<I, S>(mut self, shards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shards = shards.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sticky-session cookie name.
    #[must_use]
    pub fn with_sticky_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.sticky_cookie_name = name.into();
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable untruncated body logging.
    #[must_use]
    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = vars
            .get("CALLING_SERVICE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("CALLING_SERVICE_URL".to_string()))?
            .trim()
            .to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(format!(
                "CALLING_SERVICE_URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let basic_auth_password = vars
            .get("CALLINGSERVICE_BASIC_AUTH")
            .ok_or_else(|| ConfigError::MissingEnvVar("CALLINGSERVICE_BASIC_AUTH".to_string()))?
            .clone();

        let mut config = Self::new(base_url, SecretString::from(basic_auth_password));

        if let Some(user) = vars.get("CALLING_SERVICE_BASIC_AUTH_USER") {
            config.basic_auth_user = user.clone();
        }

        if let Some(value_str) = vars.get("CALLING_SERVICE_SHARDS") {
            let shards: Vec<String> = value_str
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();

            if shards.is_empty() {
                return Err(ConfigError::InvalidShards(
                    "CALLING_SERVICE_SHARDS must name at least one shard".to_string(),
                ));
            }

            config.shards = shards;
        }

        if let Some(name) = vars.get("CALLING_SERVICE_STICKY_COOKIE") {
            config.sticky_cookie_name = name.trim().to_string();
        }

        if let Some(value_str) = vars.get("CALLING_SERVICE_CONNECT_TIMEOUT_SECONDS") {
            config.connect_timeout =
                parse_timeout("CALLING_SERVICE_CONNECT_TIMEOUT_SECONDS", value_str)?;
        }

        if let Some(value_str) = vars.get("CALLING_SERVICE_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout =
                parse_timeout("CALLING_SERVICE_REQUEST_TIMEOUT_SECONDS", value_str)?;
        }

        if let Some(value_str) = vars.get("CALLING_SERVICE_VERBOSE_LOGGING") {
            config.verbose_logging = match value_str.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(ConfigError::InvalidVerbose(format!(
                        "CALLING_SERVICE_VERBOSE_LOGGING must be true/false/1/0, got '{}'",
                        other
                    )))
                }
            };
        }

        Ok(config)
    }
}

fn parse_timeout(name: &str, value_str: &str) -> Result<Duration, ConfigError> {
    let value: u64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}

fn trim_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
