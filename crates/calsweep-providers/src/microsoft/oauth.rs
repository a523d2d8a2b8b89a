//! OAuth 2.0 device authorization grant against the Microsoft identity platform.
//!
//! 1. POST the client id and scopes to `/devicecode`
//! 2. Show the user code and verification URL through the [`AuthPrompt`]
//! 3. Poll `/token` at the advertised interval until the user finishes,
//!    declines, or the code expires

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::auth::{AuthPrompt, DeviceCodeChallenge, OAuthFlow, RefreshOutcome};
use crate::error::{ProviderError, ProviderResult, transport_error};
use crate::http::read_json;
use crate::provider::BoxFuture;
use crate::tokens::{OAuthErrorBody, TokenInfo, TokenReply, post_token_form};

use super::config::{MicrosoftConfig, MicrosoftCredentials};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Polling interval when the device code response does not name one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Added to the polling interval on every `slow_down` reply (RFC 8628 §3.5).
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Response from the device authorization endpoint.
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Device-code sign-in and refresh for one app registration.
#[derive(Debug)]
pub struct DeviceCodeFlow {
    credentials: MicrosoftCredentials,
    device_code_url: String,
    token_url: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl DeviceCodeFlow {
    pub fn new(config: &MicrosoftConfig, http_client: reqwest::Client) -> Self {
        Self {
            credentials: config.credentials.clone(),
            device_code_url: config.device_code_url(),
            token_url: config.token_url(),
            scopes: config.scopes.clone(),
            http_client,
        }
    }

    fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// Appends the client secret when the registration has one.
    fn with_secret<'a>(&'a self, mut params: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        if let Some(secret) = self.credentials.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }
        params
    }

    async fn request_device_code(&self) -> ProviderResult<DeviceCodeResponse> {
        let scope = self.scope_param();
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.device_code_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error("device code request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OAuthErrorBody>(&body)
                .map(|e| e.describe())
                .unwrap_or(body);
            return Err(ProviderError::authentication(format!(
                "device code request failed ({}): {}",
                status, detail
            )));
        }

        read_json(response, "device code response").await
    }

    /// Runs the full device-code sign-in.
    pub async fn authorize(&self, prompt: &dyn AuthPrompt) -> ProviderResult<TokenInfo> {
        let device = self.request_device_code().await?;
        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval =
            Duration::from_secs(device.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS));

        prompt
            .device_code(&DeviceCodeChallenge {
                user_code: device.user_code.clone(),
                verification_uri: device.verification_uri.clone(),
                message: device.message.clone(),
            })
            .await?;

        info!("waiting for device sign-in to complete");
        let params = self.with_secret(vec![
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.credentials.client_id.as_str()),
            ("device_code", device.device_code.as_str()),
        ]);

        loop {
            match post_token_form(&self.http_client, &self.token_url, &params).await? {
                TokenReply::Granted(token) => {
                    info!("device sign-in completed");
                    return Ok(token.into_token_info(&self.scopes));
                }
                TokenReply::Rejected(error) => match error.error.as_str() {
                    "authorization_pending" => {
                        debug!("authorization pending");
                    }
                    "slow_down" => {
                        interval += SLOW_DOWN_STEP;
                        debug!(interval_secs = interval.as_secs(), "asked to slow down");
                    }
                    "expired_token" => {
                        return Err(ProviderError::authentication("device code expired"));
                    }
                    "authorization_declined" | "access_denied" => {
                        return Err(ProviderError::authentication(format!(
                            "sign-in was declined: {}",
                            error.describe()
                        )));
                    }
                    _ => {
                        return Err(ProviderError::authentication(format!(
                            "device code sign-in failed: {}",
                            error.describe()
                        )));
                    }
                },
            }

            if Instant::now() + interval >= deadline {
                return Err(ProviderError::authentication("device code expired"));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Exchanges a refresh token for new tokens.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshOutcome> {
        let scope = self.scope_param();
        let params = self.with_secret(vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ]);

        Ok(
            match post_token_form(&self.http_client, &self.token_url, &params).await? {
                TokenReply::Granted(token) => RefreshOutcome::Refreshed(token),
                TokenReply::Rejected(error) => RefreshOutcome::Rejected(error.describe()),
            },
        )
    }
}

impl OAuthFlow for DeviceCodeFlow {
    fn scopes(&self) -> &[String] {
        &self.scopes
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshOutcome>> {
        Box::pin(self.refresh_token(refresh_token))
    }

    fn interactive<'a>(&'a self, prompt: &'a dyn AuthPrompt) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
        Box::pin(self.authorize(prompt))
    }
}
