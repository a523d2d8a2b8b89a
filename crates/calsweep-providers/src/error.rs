//! Error types for calendar provider operations.
//!
//! Every failure the providers can report (authentication, listing,
//! calendar resolution, deletes) is a [`ProviderError`] carrying a
//! [`ProviderErrorCode`] the CLI uses to decide how to report and exit.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What went wrong, independent of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Sign-in failed, was declined, or the token was rejected (401).
    AuthenticationFailed,
    /// Signed in, but not allowed to touch this calendar (403).
    AuthorizationFailed,
    /// The request never got a response.
    NetworkError,
    /// Throttled (429); may carry a retry-after hint.
    RateLimited,
    /// 5xx from the API.
    ServerError,
    /// The API answered with something we could not read.
    InvalidResponse,
    /// The event or resource does not exist (404/410).
    NotFound,
    /// The API refused the request as malformed (400).
    BadRequest,
    /// Missing or invalid settings, caught before any request.
    ConfigurationError,
    /// No calendar matches the requested name.
    CalendarError,
    /// Local failure that is not the API's fault.
    InternalError,
}

impl ProviderErrorCode {
    /// Stable snake_case name, used in log lines and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::CalendarError => "calendar_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed provider operation.
#[derive(Debug, Error)]
#[error("{}{code}: {message}", provider_prefix(.provider))]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// "microsoft" or "google", once the provider has tagged the error.
    provider: Option<String>,
    /// Server-requested wait before retrying a rate-limited request.
    retry_after: Option<Duration>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn provider_prefix(provider: &Option<String>) -> String {
    provider
        .as_deref()
        .map(|p| format!("[{}] ", p))
        .unwrap_or_default()
}

/// One shorthand constructor per error code.
macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ProviderErrorCode::$code, message)
            }
        )*
    };
}

impl ProviderError {
    /// Creates an error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            retry_after: None,
            source: None,
        }
    }

    constructors! {
        /// Sign-in or token rejection.
        authentication => AuthenticationFailed;
        /// Permission denied.
        authorization => AuthorizationFailed;
        network => NetworkError;
        /// Throttled; see [`ProviderError::with_retry_after`].
        rate_limited => RateLimited;
        server => ServerError;
        invalid_response => InvalidResponse;
        not_found => NotFound;
        bad_request => BadRequest;
        configuration => ConfigurationError;
        /// Calendar lookup failure.
        calendar => CalendarError;
        internal => InternalError;
    }

    /// Tags the error with the provider that raised it.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Records the server's retry-after hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Only rate-limited requests are worth retrying in a sweep.
    pub fn is_rate_limited(&self) -> bool {
        self.code == ProviderErrorCode::RateLimited
    }
}

/// Maps a transport-level reqwest failure to a network error.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("{}: request timeout", context)
    } else if err.is_connect() {
        format!("{}: connection failed: {}", context, err)
    } else {
        format!("{}: {}", context, err)
    };
    ProviderError::network(message).with_source(err)
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_stable_names() {
        assert_eq!(
            ProviderErrorCode::AuthenticationFailed.as_str(),
            "authentication_failed"
        );
        assert_eq!(ProviderErrorCode::CalendarError.to_string(), "calendar_error");
    }

    #[test]
    fn constructors_set_code_and_message() {
        let err = ProviderError::authentication("device code expired");
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.message(), "device code expired");
        assert!(err.provider().is_none());
        assert!(!err.is_rate_limited());

        assert_eq!(
            ProviderError::not_found("gone").code(),
            ProviderErrorCode::NotFound
        );
    }

    #[test]
    fn display_includes_provider_tag() {
        let err = ProviderError::rate_limited("too many requests").with_provider("microsoft");
        assert_eq!(
            err.to_string(),
            "[microsoft] rate_limited: too many requests"
        );

        let untagged = ProviderError::calendar("calendar not found: \"Flows\"");
        assert_eq!(
            untagged.to_string(),
            "calendar_error: calendar not found: \"Flows\""
        );
    }

    #[test]
    fn rate_limit_hint() {
        let err = ProviderError::rate_limited("slow down").with_retry_after(Duration::from_secs(7));
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ProviderError::internal("failed to write token cache").with_source(io_err);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
    }
}
