//! Errors that end a run, and how provider failures map onto them.

use std::fmt;

use calsweep_core::TimeError;
use calsweep_providers::{ProviderError, ProviderErrorCode};

/// Result alias used across the CLI crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end a sweep run.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error (bad flags, config file, missing credentials).
    Config(String),
    /// The time window could not be parsed or is empty.
    Window(TimeError),
    /// Sign-in or token refresh failed.
    Auth(ProviderError),
    /// The requested calendar could not be found.
    Resolution(ProviderError),
    /// Any other provider failure.
    Provider(ProviderError),
    /// Local file or terminal failure.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Window(err) => write!(f, "invalid time window: {}", err),
            Self::Auth(err) => write!(f, "authentication failed: {}", err),
            Self::Resolution(err) => write!(f, "{}", err),
            Self::Provider(err) => write!(f, "provider error: {}", err),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Window(err) => Some(err),
            Self::Auth(err) | Self::Resolution(err) | Self::Provider(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<TimeError> for ClientError {
    fn from(err: TimeError) -> Self {
        Self::Window(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        match err.code() {
            ProviderErrorCode::AuthenticationFailed | ProviderErrorCode::AuthorizationFailed => {
                Self::Auth(err)
            }
            ProviderErrorCode::CalendarError => Self::Resolution(err),
            ProviderErrorCode::ConfigurationError => Self::Config(err.message().to_string()),
            _ => Self::Provider(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_codes_map_to_client_variants() {
        assert!(matches!(
            ClientError::from(ProviderError::authentication("expired")),
            ClientError::Auth(_)
        ));
        assert!(matches!(
            ClientError::from(ProviderError::authorization("forbidden")),
            ClientError::Auth(_)
        ));
        assert!(matches!(
            ClientError::from(ProviderError::calendar("calendar not found")),
            ClientError::Resolution(_)
        ));
        assert!(matches!(
            ClientError::from(ProviderError::configuration("missing tenant")),
            ClientError::Config(_)
        ));
        assert!(matches!(
            ClientError::from(ProviderError::server("boom")),
            ClientError::Provider(_)
        ));
        assert!(matches!(
            ClientError::from(ProviderError::rate_limited("slow down")),
            ClientError::Provider(_)
        ));
    }

    #[test]
    fn window_error_display() {
        let err = ClientError::from(TimeError::Format {
            input: "tomorrow".to_string(),
        });
        assert!(err.to_string().starts_with("invalid time window:"));
        assert!(err.to_string().contains("YYYY-MM-DD HH:MM"));
    }
}
