//! Authentication: token reuse, silent refresh and the interactive fallback.
//!
//! The [`Authenticator`] owns a provider's [`TokenCache`] and an
//! [`OAuthFlow`] that knows how to talk to that provider's token endpoints.
//! The user-facing part of an interactive sign-in goes through an
//! [`AuthPrompt`], so the CLI prints instructions while tests approve
//! immediately.

use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;
use crate::tokens::{TokenCache, TokenInfo, TokenResponse};

/// What the user needs to complete a device-code sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeChallenge {
    /// The code to type in at the verification page.
    pub user_code: String,
    /// Where to type it.
    pub verification_uri: String,
    /// Ready-made instructions from the identity provider, if any.
    pub message: Option<String>,
}

impl DeviceCodeChallenge {
    /// The provider's message, or instructions built from the URL and code.
    pub fn instructions(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!(
                "To sign in, open {} and enter the code {}",
                self.verification_uri, self.user_code
            ),
        }
    }
}

/// A browser sign-in whose redirect lands on a local listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserAuthorization {
    /// The consent page to open.
    pub url: String,
    /// The loopback address the provider will redirect to.
    pub redirect_uri: String,
}

/// The interactive half of a sign-in.
///
/// Implementations show the challenge to the user. They return once the
/// user has been told what to do; the flow itself waits for completion.
pub trait AuthPrompt: Send + Sync {
    /// Shows a device code to the user.
    fn device_code<'a>(&'a self, challenge: &'a DeviceCodeChallenge)
    -> BoxFuture<'a, ProviderResult<()>>;

    /// Sends the user to a browser consent page.
    fn browser_authorization<'a>(
        &'a self,
        request: &'a BrowserAuthorization,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Result of presenting a refresh token to the token endpoint.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new access token, possibly with a rotated refresh token.
    Refreshed(TokenResponse),
    /// The identity provider no longer accepts the refresh token.
    Rejected(String),
}

/// Provider-specific OAuth grants.
pub trait OAuthFlow: Send + Sync {
    /// Scopes every cached token must carry.
    fn scopes(&self) -> &[String];

    /// Exchanges a refresh token for a new access token.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshOutcome>>;

    /// Runs the interactive sign-in.
    fn interactive<'a>(&'a self, prompt: &'a dyn AuthPrompt)
    -> BoxFuture<'a, ProviderResult<TokenInfo>>;
}

/// Produces access tokens for one provider account.
#[derive(Debug)]
pub struct Authenticator<F> {
    flow: F,
    cache: TokenCache,
}

impl<F: OAuthFlow> Authenticator<F> {
    /// Creates an authenticator backed by the given flow and cache.
    pub fn new(flow: F, cache: TokenCache) -> Self {
        Self { flow, cache }
    }

    /// Returns the token cache.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns the OAuth flow.
    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Returns true if a usable token is loaded.
    pub fn is_authenticated(&self) -> bool {
        self.cache.has_valid_tokens(self.flow.scopes())
    }

    /// Makes sure a valid access token is cached, signing in if needed.
    ///
    /// A cached token that is still valid is reused without touching the
    /// network. An expired one is refreshed. Only when neither works does
    /// the interactive flow run through `prompt`.
    pub async fn authenticate(&self, prompt: &dyn AuthPrompt) -> ProviderResult<TokenInfo> {
        if self.cache.get().is_none() {
            self.cache.load()?;
        }

        if let Some(tokens) = self.cache.get() {
            if !tokens.has_scopes(self.flow.scopes()) {
                info!("cached token lacks required scopes, signing in again");
            } else if !tokens.is_expired() {
                debug!("reusing cached access token");
                return Ok(tokens);
            } else if let Some(refreshed) = self.try_refresh(&tokens).await? {
                return Ok(refreshed);
            }
        }

        info!("starting interactive sign-in");
        let tokens = self.flow.interactive(prompt).await?;
        self.cache.set(tokens.clone())?;
        info!("signed in, token cached at {:?}", self.cache.path());
        Ok(tokens)
    }

    /// Returns a valid access token without user interaction.
    ///
    /// Refreshes an expired token when possible. Fails if the cache is empty
    /// or the refresh token is rejected.
    pub async fn access_token(&self) -> ProviderResult<String> {
        let tokens = self.cache.get().ok_or_else(|| {
            ProviderError::authentication("not authenticated, sign-in required")
        })?;

        if !tokens.is_expired() {
            return Ok(tokens.access_token);
        }

        match self.try_refresh(&tokens).await? {
            Some(refreshed) => Ok(refreshed.access_token),
            None => Err(ProviderError::authentication(
                "access token expired and could not be refreshed",
            )),
        }
    }

    /// Refreshes `tokens` if they carry a refresh token.
    ///
    /// Returns `Ok(None)` when there is nothing to refresh with or the
    /// provider rejected the refresh token.
    async fn try_refresh(&self, tokens: &TokenInfo) -> ProviderResult<Option<TokenInfo>> {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            debug!("cached token expired and has no refresh token");
            return Ok(None);
        };

        debug!("access token expired, refreshing");
        match self.flow.refresh(refresh_token).await? {
            RefreshOutcome::Refreshed(response) => {
                let updated = self.cache.apply_refresh(response)?;
                info!("refreshed access token");
                Ok(Some(updated))
            }
            RefreshOutcome::Rejected(reason) => {
                warn!("refresh token rejected: {}", reason);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};

    /// Prompt that records how often it was asked to show something.
    #[derive(Debug, Default)]
    pub(crate) struct CountingPrompt {
        pub(crate) shown: AtomicUsize,
    }

    impl AuthPrompt for CountingPrompt {
        fn device_code<'a>(
            &'a self,
            _challenge: &'a DeviceCodeChallenge,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            self.shown.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn browser_authorization<'a>(
            &'a self,
            _request: &'a BrowserAuthorization,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            self.shown.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    struct FakeFlow {
        scopes: Vec<String>,
        accept_refresh: bool,
        refreshes: AtomicUsize,
        sign_ins: AtomicUsize,
    }

    impl FakeFlow {
        fn new(accept_refresh: bool) -> Self {
            Self {
                scopes: vec!["calendar".to_string()],
                accept_refresh,
                refreshes: AtomicUsize::new(0),
                sign_ins: AtomicUsize::new(0),
            }
        }
    }

    impl OAuthFlow for FakeFlow {
        fn scopes(&self) -> &[String] {
            &self.scopes
        }

        fn refresh<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> BoxFuture<'a, ProviderResult<RefreshOutcome>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            let accept = self.accept_refresh;
            Box::pin(async move {
                if accept {
                    Ok(RefreshOutcome::Refreshed(TokenResponse {
                        access_token: "refreshed".to_string(),
                        refresh_token: Some("rotated".to_string()),
                        expires_in: Some(3600),
                    }))
                } else {
                    Ok(RefreshOutcome::Rejected("invalid_grant".to_string()))
                }
            })
        }

        fn interactive<'a>(
            &'a self,
            prompt: &'a dyn AuthPrompt,
        ) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
            self.sign_ins.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                prompt
                    .device_code(&DeviceCodeChallenge {
                        user_code: "ABCD".to_string(),
                        verification_uri: "https://example.test/device".to_string(),
                        message: None,
                    })
                    .await?;
                Ok(TokenInfo::new(
                    "interactive",
                    Some("rt".to_string()),
                    Some(3600),
                    self.scopes.clone(),
                ))
            })
        }
    }

    fn cached(dir: &tempfile::TempDir, token: Option<TokenInfo>) -> TokenCache {
        let path = dir.path().join("token_cache.json");
        if let Some(token) = token {
            TokenCache::new(&path).set(token).unwrap();
        }
        TokenCache::new(path)
    }

    fn expired_token() -> TokenInfo {
        let mut token = TokenInfo::new(
            "stale",
            Some("rt".to_string()),
            Some(3600),
            vec!["calendar".to_string()],
        );
        token.expires_at = Some(Utc::now() - Duration::minutes(5));
        token
    }

    #[tokio::test]
    async fn valid_cached_token_skips_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let token = TokenInfo::new("cached", None, Some(3600), vec!["calendar".to_string()]);
        let auth = Authenticator::new(FakeFlow::new(true), cached(&dir, Some(token)));
        let prompt = CountingPrompt::default();

        let tokens = auth.authenticate(&prompt).await.unwrap();

        assert_eq!(tokens.access_token, "cached");
        assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
        assert_eq!(auth.flow().sign_ins.load(Ordering::SeqCst), 0);
        assert_eq!(auth.flow().refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_silently() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(FakeFlow::new(true), cached(&dir, Some(expired_token())));
        let prompt = CountingPrompt::default();

        let tokens = auth.authenticate(&prompt).await.unwrap();

        assert_eq!(tokens.access_token, "refreshed");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);

        // The rotated refresh token was persisted.
        let reloaded = TokenCache::new(auth.cache().path());
        reloaded.load().unwrap();
        assert_eq!(
            reloaded.get().unwrap().refresh_token.as_deref(),
            Some("rotated")
        );
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(FakeFlow::new(false), cached(&dir, Some(expired_token())));
        let prompt = CountingPrompt::default();

        let tokens = auth.authenticate(&prompt).await.unwrap();

        assert_eq!(tokens.access_token, "interactive");
        assert_eq!(prompt.shown.load(Ordering::SeqCst), 1);
        assert_eq!(auth.flow().refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_cache_signs_in_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(FakeFlow::new(true), cached(&dir, None));
        let prompt = CountingPrompt::default();

        auth.authenticate(&prompt).await.unwrap();

        assert!(auth.cache().path().exists());
        assert!(auth.is_authenticated());
        assert_eq!(auth.access_token().await.unwrap(), "interactive");
    }

    #[tokio::test]
    async fn missing_scopes_force_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let token = TokenInfo::new("narrow", None, Some(3600), vec!["other".to_string()]);
        let auth = Authenticator::new(FakeFlow::new(true), cached(&dir, Some(token)));
        let prompt = CountingPrompt::default();

        let tokens = auth.authenticate(&prompt).await.unwrap();
        assert_eq!(tokens.access_token, "interactive");
    }

    #[tokio::test]
    async fn access_token_without_sign_in_fails() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(FakeFlow::new(true), cached(&dir, None));
        let err = auth.access_token().await.unwrap_err();
        assert_eq!(
            err.code(),
            crate::error::ProviderErrorCode::AuthenticationFailed
        );
    }

    #[test]
    fn device_code_instructions() {
        let challenge = DeviceCodeChallenge {
            user_code: "XYZ".to_string(),
            verification_uri: "https://microsoft.com/devicelogin".to_string(),
            message: None,
        };
        assert!(challenge.instructions().contains("XYZ"));

        let with_message = DeviceCodeChallenge {
            message: Some("Go sign in".to_string()),
            ..challenge
        };
        assert_eq!(with_message.instructions(), "Go sign in");
    }
}
