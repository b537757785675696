use thiserror::Error;

/// Failure talking to the backend platform.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The platform answered with an error document
    #[error("{message}")]
    Platform {
        code: u16,
        kind: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl BackendError {
    pub fn platform(code: u16, kind: &str, message: &str) -> Self {
        Self::Platform {
            code,
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }

    /// Message fit for showing to the user, if the platform supplied one.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Platform { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}
