//! OAuth token cache and token-endpoint plumbing.
//!
//! [`TokenCache`] is the only state calsweep persists: one JSON file per
//! provider holding the access and refresh tokens. It is created on the
//! first successful sign-in, reused on later runs and removed by `--clean`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult, transport_error};

/// Tokens count as expired this long before the server says they do.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// What the cache file holds for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    /// Absent when the provider never issued one; sign-in is then needed
    /// again once the access token lapses.
    pub refresh_token: Option<String>,
    /// `None` means the server gave no lifetime; the token is trusted until
    /// an API call rejects it.
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes requested when the tokens were issued.
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(lifetime_to_deadline),
            scopes,
            issued_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Utc::now() >= deadline)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|wanted| self.scopes.iter().any(|s| s == wanted))
    }

    /// Takes a new access token from a refresh grant, keeping the stored
    /// refresh token unless the server rotated it.
    pub fn apply_refresh(&mut self, grant: TokenResponse) {
        let TokenResponse {
            access_token,
            refresh_token,
            expires_in,
        } = grant;
        self.access_token = access_token;
        self.expires_at = expires_in.map(lifetime_to_deadline);
        if let Some(rotated) = refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.issued_at = Utc::now();
    }
}

fn lifetime_to_deadline(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs.saturating_sub(EXPIRY_MARGIN_SECS))
}

fn cache_error(what: &str, path: &Path, err: std::io::Error) -> ProviderError {
    ProviderError::configuration(format!("{} {}: {}", what, path.display(), err)).with_source(err)
}

/// The token file of one provider, mirrored in memory.
///
/// Nothing is read until [`TokenCache::load`]; every change is written
/// through to disk before it becomes visible.
#[derive(Debug)]
pub struct TokenCache {
    path: PathBuf,
    current: RwLock<Option<TokenInfo>>,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    fn replace(&self, tokens: Option<TokenInfo>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = tokens;
    }

    /// Reads the file. `Ok(false)` when there is none yet.
    pub fn load(&self) -> ProviderResult<bool> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token cache yet");
                return Ok(false);
            }
            Err(e) => return Err(cache_error("cannot read token cache", &self.path, e)),
        };

        let tokens = serde_json::from_str::<TokenInfo>(&raw).map_err(|e| {
            ProviderError::configuration(format!(
                "token cache {} is unreadable: {} (run with --clean to reset it)",
                self.path.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), "token cache loaded");
        self.replace(Some(tokens));
        Ok(true)
    }

    /// Writes `tokens` via a sibling temp file, owner-only on Unix.
    fn persist(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| cache_error("cannot create directory for", &self.path, e))?;
        }

        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("cannot encode tokens: {}", e)))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)
            .map_err(|e| cache_error("cannot write token cache", &staging, e))?;
        fs::rename(&staging, &self.path)
            .map_err(|e| cache_error("cannot replace token cache", &self.path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)) {
                debug!("could not restrict token cache permissions: {}", e);
            }
        }

        debug!(path = %self.path.display(), "token cache written");
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the stored tokens after a fresh sign-in.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.persist(&tokens)?;
        self.replace(Some(tokens));
        Ok(())
    }

    /// Folds a refresh grant into the stored tokens.
    pub fn apply_refresh(&self, grant: TokenResponse) -> ProviderResult<TokenInfo> {
        let mut updated = self
            .get()
            .ok_or_else(|| ProviderError::internal("refresh grant without cached tokens"))?;
        updated.apply_refresh(grant);
        self.persist(&updated)?;
        self.replace(Some(updated.clone()));
        Ok(updated)
    }

    /// Forgets the tokens and deletes the file. Returns whether a file was removed.
    pub fn clear(&self) -> ProviderResult<bool> {
        self.replace(None);
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token cache removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(cache_error("cannot remove token cache", &self.path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Usable without a network round trip: present, unexpired, and wide enough.
    pub fn has_valid_tokens(&self, required_scopes: &[String]) -> bool {
        self.get()
            .is_some_and(|t| !t.is_expired() && t.has_scopes(required_scopes))
    }
}

/// Successful response from an OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Converts a fresh grant into a cacheable token set.
    pub fn into_token_info(self, scopes: &[String]) -> TokenInfo {
        TokenInfo::new(
            self.access_token,
            self.refresh_token,
            self.expires_in,
            scopes.to_vec(),
        )
    }
}

/// Error body returned by OAuth token endpoints (RFC 6749 §5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorBody {
    /// Formats the error for user-facing messages.
    pub fn describe(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

/// Outcome of a token endpoint POST.
#[derive(Debug)]
pub(crate) enum TokenReply {
    Granted(TokenResponse),
    Rejected(OAuthErrorBody),
}

/// Posts a form to a token endpoint and classifies the reply.
pub(crate) async fn post_token_form(
    http_client: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> ProviderResult<TokenReply> {
    let response = http_client
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| transport_error("token request failed", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error("failed to read token response", e))?;

    if status.is_success() {
        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })?;
        return Ok(TokenReply::Granted(token));
    }

    match serde_json::from_str::<OAuthErrorBody>(&body) {
        Ok(error) => Ok(TokenReply::Rejected(error)),
        Err(_) => Err(ProviderError::authentication(format!(
            "token endpoint returned {}: {}",
            status, body
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_cache.json");
        (dir, path)
    }

    #[test]
    fn fresh_grant_is_not_expired() {
        let token = TokenInfo::new("at", Some("rt".to_string()), Some(3600), vec!["s".to_string()]);
        assert!(!token.is_expired());
        assert!(token.has_scopes(&["s".to_string()]));
        assert!(token.has_scopes(&[]));
        assert!(!token.has_scopes(&["other".to_string()]));
    }

    #[test]
    fn past_deadline_is_expired() {
        let mut token = TokenInfo::new("at", None, Some(3600), vec![]);
        token.expires_at = Some(Utc::now() - Duration::minutes(5));
        assert!(token.is_expired());

        token.expires_at = None;
        assert!(!token.is_expired());
    }

    #[test]
    fn short_lived_token_counts_as_expired() {
        // Lifetime shorter than the safety margin.
        let token = TokenInfo::new("access", None, Some(30), vec![]);
        assert!(token.is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let mut token = TokenInfo::new("old", Some("rt-1".to_string()), Some(10), vec![]);
        token.apply_refresh(TokenResponse {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
        });
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-1"));
        assert!(!token.is_expired());

        token.apply_refresh(TokenResponse {
            access_token: "newer".to_string(),
            refresh_token: Some("rt-2".to_string()),
            expires_in: Some(3600),
        });
        assert_eq!(token.refresh_token.as_deref(), Some("rt-2"));
    }

    #[test]
    fn cache_survives_a_restart() {
        let (_dir, path) = temp_cache();
        TokenCache::new(&path)
            .set(TokenInfo::new(
                "access-token",
                Some("refresh-token".to_string()),
                Some(3600),
                vec!["scope1".to_string()],
            ))
            .unwrap();
        assert!(path.exists());

        let reloaded = TokenCache::new(&path);
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get().unwrap().access_token, "access-token");
        assert!(reloaded.has_valid_tokens(&["scope1".to_string()]));
        assert!(!reloaded.has_valid_tokens(&["scope2".to_string()]));
    }

    #[cfg(unix)]
    #[test]
    fn token_cache_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = temp_cache();
        let cache = TokenCache::new(&path);
        cache.set(TokenInfo::new("a", None, None, vec![])).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn token_cache_clear_is_idempotent() {
        let (_dir, path) = temp_cache();
        let cache = TokenCache::new(&path);

        cache.set(TokenInfo::new("access", None, None, vec![])).unwrap();
        assert!(cache.clear().unwrap());
        assert!(!path.exists());
        assert!(cache.get().is_none());

        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn token_cache_no_file() {
        let (_dir, path) = temp_cache();
        let cache = TokenCache::new(path);
        assert!(!cache.load().unwrap());
        assert!(cache.get().is_none());
        assert!(!cache.has_valid_tokens(&[]));
    }

    #[test]
    fn token_cache_corrupt_file() {
        let (_dir, path) = temp_cache();
        fs::write(&path, "not json").unwrap();
        let err = TokenCache::new(&path).load().unwrap_err();
        assert!(err.message().contains("--clean"));
    }

    #[test]
    fn oauth_error_description() {
        let body: OAuthErrorBody = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "token revoked"}"#,
        )
        .unwrap();
        assert_eq!(body.describe(), "invalid_grant: token revoked");
    }
}
