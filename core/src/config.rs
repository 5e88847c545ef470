//! Client configuration from explicit values or environment variables.

use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_API_URL: &str = "http://api.vk.com/api.php";
pub const DEFAULT_API_VERSION: &str = "3.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;

pub const ENV_API_ID: &str = "VK_API_ID";
pub const ENV_API_SECRET: &str = "VK_API_SECRET";
pub const ENV_API_URL: &str = "VK_API_URL";
pub const ENV_API_VERSION: &str = "VK_API_VERSION";
pub const ENV_TIMEOUT_SECS: &str = "VK_API_TIMEOUT_SECS";

/// Application identity. Without a secret, requests go out unsigned.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub api_url: String,
    pub api_version: String,
    /// Used when a call does not carry its own timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(app_id: impl Into<String>, app_secret: Option<String>) -> Self {
        Self {
            credentials: Credentials {
                app_id: app_id.into(),
                app_secret: app_secret.filter(|s| !s.is_empty()),
            },
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build config entirely from environment variables.
    ///
    /// Required:
    /// - `VK_API_ID`
    ///
    /// Optional:
    /// - `VK_API_SECRET`: requests are unsigned when absent
    /// - `VK_API_URL`: default `http://api.vk.com/api.php`
    /// - `VK_API_VERSION`: default `3.0`
    /// - `VK_API_TIMEOUT_SECS`: default 1
    pub fn from_env() -> Result<Self, Error> {
        Self::resolve(None, None)
    }

    /// Explicit identity wins; missing pieces fall back to the environment.
    pub fn resolve(app_id: Option<String>, app_secret: Option<String>) -> Result<Self, Error> {
        Self::resolve_with(app_id, app_secret, |key| std::env::var(key).ok())
    }

    pub(crate) fn resolve_with<F>(app_id: Option<String>, app_secret: Option<String>, env: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = app_id
            .filter(|id| !id.is_empty())
            .or_else(|| env(ENV_API_ID).filter(|id| !id.is_empty()))
            .ok_or_else(|| Error::Config(format!("application id is required (pass it explicitly or set {ENV_API_ID})")))?;
        let app_secret = app_secret.or_else(|| env(ENV_API_SECRET));

        let mut config = Self::new(app_id, app_secret);
        if let Some(url) = env(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(version) = env(ENV_API_VERSION) {
            config.api_version = version;
        }
        config.timeout = Duration::from_secs(env_parse_u64(&env, ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS));
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Reject configs that cannot identify the application.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.credentials.app_id.trim().is_empty() {
            return Err(Error::Config("application id must not be empty".into()));
        }
        if self.api_url.is_empty() {
            return Err(Error::Config("API url must not be empty".into()));
        }
        Ok(())
    }
}

fn env_parse_u64<F>(env: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    env(key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default)
}
