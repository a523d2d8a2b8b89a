//! Shared fixtures for the provider integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use calsweep_core::{TimeWindow, WindowZone};
use calsweep_providers::{
    AuthPrompt, BoxFuture, BrowserAuthorization, DeviceCodeChallenge, ProviderError,
    ProviderResult,
};

/// Prompt that approves every sign-in immediately.
///
/// For browser sign-ins it plays the browser: it follows the redirect back
/// to the loopback listener with a code and the state from the consent URL.
#[derive(Debug, Default)]
pub struct ApprovingPrompt {
    pub device_codes: AtomicUsize,
    pub browser_visits: AtomicUsize,
    pub last_user_code: std::sync::Mutex<Option<String>>,
}

impl ApprovingPrompt {
    pub fn prompts(&self) -> usize {
        self.device_codes.load(Ordering::SeqCst) + self.browser_visits.load(Ordering::SeqCst)
    }
}

impl AuthPrompt for ApprovingPrompt {
    fn device_code<'a>(
        &'a self,
        challenge: &'a DeviceCodeChallenge,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.device_codes.fetch_add(1, Ordering::SeqCst);
        *self.last_user_code.lock().unwrap() = Some(challenge.user_code.clone());
        Box::pin(async { Ok(()) })
    }

    fn browser_authorization<'a>(
        &'a self,
        request: &'a BrowserAuthorization,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.browser_visits.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let consent = url::Url::parse(&request.url).unwrap();
            let state = consent
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();

            let mut redirect = url::Url::parse(&request.redirect_uri).unwrap();
            redirect
                .query_pairs_mut()
                .append_pair("code", "4/test-code")
                .append_pair("state", &state);

            let response = reqwest::get(redirect)
                .await
                .map_err(|e| ProviderError::network(e.to_string()))?;
            assert!(response.status().is_success());
            Ok(())
        })
    }
}

/// Builds a window from `YYYY-MM-DD HH:MM` strings read as UTC.
pub fn utc_window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::parse_local(start, end, "UTC".parse::<WindowZone>().unwrap()).unwrap()
}
