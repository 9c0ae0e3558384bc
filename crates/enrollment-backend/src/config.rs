use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TABLE: &str = "enrollment_applications";

pub const ENV_URL: &str = "ENROLLMENT_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "ENROLLMENT_BACKEND_ANON_KEY";
pub const ENV_TABLE: &str = "ENROLLMENT_TABLE";
pub const ENV_REDIRECT_URL: &str = "ENROLLMENT_REDIRECT_URL";
pub const ENV_SESSION_FILE: &str = "ENROLLMENT_SESSION_FILE";

/// Connection settings for the hosted auth and table services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub session_path: Option<PathBuf>,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: default_table(),
            redirect_url: None,
            session_path: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validated()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let config = Self {
            url: get(ENV_URL).ok_or(ConfigError::Missing(ENV_URL))?,
            anon_key: get(ENV_ANON_KEY).ok_or(ConfigError::Missing(ENV_ANON_KEY))?,
            table: get(ENV_TABLE).unwrap_or_else(default_table),
            redirect_url: get(ENV_REDIRECT_URL),
            session_path: get(ENV_SESSION_FILE).map(PathBuf::from),
        };
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("anon_key"));
        }
        let parsed = Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(self.url));
        }
        Ok(self)
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base(), endpoint.trim_start_matches('/'))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base(), table)
    }

    /// First host label, used to name the stored session key.
    pub fn project_ref(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| {
                url.host_str()
                    .and_then(|host| host.split('.').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "local".to_string())
    }

    /// Where sign-up confirmation links should land; the dashboard root.
    pub fn email_redirect(&self) -> String {
        self.redirect_url
            .clone()
            .unwrap_or_else(|| format!("{}/", self.base()))
    }
}
