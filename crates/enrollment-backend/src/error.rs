use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Substring the auth service uses when an email is already taken.
pub const ALREADY_REGISTERED: &str = "User already registered";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("not authenticated, sign in first")]
    NotAuthenticated,

    #[error("{0}")]
    AlreadyRegistered(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session storage error: {0}")]
    Storage(String),
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(ALREADY_REGISTERED) {
            Self::AlreadyRegistered(message)
        } else {
            Self::Api { status, message }
        }
    }

    /// Message suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::AlreadyRegistered(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing setting {0}")]
    Missing(&'static str),
    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),
}
