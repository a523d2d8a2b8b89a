//! HTTP plumbing shared by the Microsoft and Google clients.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, ProviderResult, transport_error};

/// Builds the HTTP client used for every request of one provider.
pub(crate) fn build_http_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("calsweep/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ProviderError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
        })
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Turns a non-success response into a [`ProviderError`].
///
/// 404 and 410 both map to `not_found` so callers can treat a vanished
/// resource uniformly.
pub(crate) async fn status_error(response: reqwest::Response, context: &str) -> ProviderError {
    let status = response.status();
    let hint = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    let detail = if body.is_empty() {
        format!("{} ({})", context, status)
    } else {
        format!("{} ({}): {}", context, status, body)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let err = ProviderError::rate_limited(match hint {
                Some(d) => format!("{}: rate limit exceeded, retry after {} seconds", context, d.as_secs()),
                None => format!("{}: rate limit exceeded", context),
            });
            match hint {
                Some(d) => err.with_retry_after(d),
                None => err,
            }
        }
        StatusCode::UNAUTHORIZED => ProviderError::authentication(format!(
            "{}: access token expired or invalid",
            context
        )),
        StatusCode::FORBIDDEN => ProviderError::authorization(detail),
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::not_found(detail),
        StatusCode::BAD_REQUEST => ProviderError::bad_request(detail),
        s if s.is_server_error() => ProviderError::server(detail),
        _ => ProviderError::invalid_response(detail),
    }
}

/// Reads a JSON body from a successful response.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(context, e))?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("{}: failed to parse response: {}", context, e))
    })
}
