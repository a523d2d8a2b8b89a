//! Settings for the Google Calendar backend and the OAuth client it signs in with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// An installed-app OAuth client registered in the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// The shapes a downloaded client secret file comes in.
#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Installed { installed: OAuthCredentials },
    Web { web: OAuthCredentials },
    Flat(OAuthCredentials),
}

const GOOGLE_CLIENT_SUFFIX: &str = ".apps.googleusercontent.com";

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads a `credentials.json` / `client_secret_*.json` download.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::from_json(&raw).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Parses the `installed`, `web` or flat `client_id`/`client_secret` layout.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("not valid JSON: {}", e))?;
        match serde_json::from_value(value) {
            Ok(CredentialsFile::Installed { installed: found })
            | Ok(CredentialsFile::Web { web: found })
            | Ok(CredentialsFile::Flat(found)) => Ok(found),
            Err(_) => Err(
                "expected an 'installed' or 'web' client, or top-level client_id and client_secret"
                    .to_string(),
            ),
        }
    }

    /// Catches the usual copy-paste mistakes before the consent page does.
    pub fn validate(&self) -> Result<(), &'static str> {
        match (self.client_id.trim(), self.client_secret.trim()) {
            ("", _) => Err("client_id is empty"),
            (id, _) if !id.ends_with(GOOGLE_CLIENT_SUFFIX) => {
                Err("client_id is not a Google OAuth client (expected *.apps.googleusercontent.com)")
            }
            (_, "") => Err("client_secret is empty"),
            _ => Ok(()),
        }
    }
}

/// Everything [`GoogleProvider`](super::GoogleProvider) needs besides a prompt.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,

    /// Token cache file, `token.json` in the working directory unless set.
    pub token_path: PathBuf,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// Inclusive range tried, in order, for the sign-in redirect listener.
    /// `(0, 0)` asks the OS for any free port.
    pub loopback_ports: (u16, u16),

    /// Requested scopes; deleting needs full calendar access.
    pub scopes: Vec<String>,

    pub auth_url: String,
    pub token_url: String,

    /// Calendar API root, without a trailing slash.
    pub api_base: String,

    /// `maxResults` per events page.
    pub page_size: u32,
}

impl GoogleConfig {
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";
    pub const DEFAULT_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const DEFAULT_TOKEN_FILE: &'static str = "token.json";

    /// Largest `maxResults` the events endpoint accepts.
    pub const DEFAULT_PAGE_SIZE: u32 = 2500;

    const DEFAULT_LOOPBACK_PORTS: (u16, u16) = (8080, 8090);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            token_path: Self::DEFAULT_TOKEN_FILE.into(),
            timeout: Self::REQUEST_TIMEOUT,
            loopback_ports: Self::DEFAULT_LOOPBACK_PORTS,
            scopes: vec![Self::DEFAULT_SCOPE.into()],
            auth_url: Self::DEFAULT_AUTH_URL.into(),
            token_url: Self::DEFAULT_TOKEN_URL.into(),
            api_base: Self::DEFAULT_API_BASE.into(),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_loopback_port_range(mut self, first: u16, last: u16) -> Self {
        self.loopback_ports = (first, last);
        self
    }

    /// Points the consent page and token endpoint somewhere else.
    pub fn with_oauth_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Rejects settings that would only fail later, mid sign-in or mid listing.
    pub fn validate(&self) -> Result<(), String> {
        if let Err(reason) = self.credentials.validate() {
            return Err(format!("Google OAuth client: {}", reason));
        }
        if self.scopes.is_empty() {
            return Err("no OAuth scopes requested".to_string());
        }
        let (first, last) = self.loopback_ports;
        if first > last {
            return Err(format!("loopback ports {}-{} are reversed", first, last));
        }
        if !(1..=Self::DEFAULT_PAGE_SIZE).contains(&self.page_size) {
            return Err(format!(
                "page size {} is outside 1..={}",
                self.page_size,
                Self::DEFAULT_PAGE_SIZE
            ));
        }
        Ok(())
    }
}
