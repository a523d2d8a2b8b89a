//! Microsoft Graph provider configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Azure AD application registration used for sign-in.
#[derive(Debug, Clone)]
pub struct MicrosoftCredentials {
    /// Application (client) ID.
    pub client_id: String,
    /// Directory (tenant) ID or domain, `common` and `organizations` included.
    pub tenant_id: String,
    /// Client secret, sent only when the app registration requires one.
    pub client_secret: Option<String>,
}

impl MicrosoftCredentials {
    /// Creates credentials for a public client.
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            client_secret: None,
        }
    }

    /// Adds a client secret. Empty strings are ignored.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.client_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    /// Validates that the required identifiers are present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.trim().is_empty() {
            return Err("client_id is required");
        }
        if self.tenant_id.trim().is_empty() {
            return Err("tenant_id is required");
        }
        if self.tenant_id.contains('/') {
            return Err("tenant_id must not contain '/'");
        }
        Ok(())
    }
}

/// Configuration for the Microsoft Graph provider.
#[derive(Debug, Clone)]
pub struct MicrosoftConfig {
    /// App registration used for the device-code flow.
    pub credentials: MicrosoftCredentials,

    /// Identity platform host, without tenant.
    ///
    /// Defaults to `https://login.microsoftonline.com`.
    pub authority: String,

    /// Graph API root including the version segment.
    ///
    /// Defaults to `https://graph.microsoft.com/v1.0`.
    pub graph_base: String,

    /// Path of the token cache file.
    ///
    /// Defaults to `token_cache.json` in the working directory.
    pub token_path: PathBuf,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Events per calendarView page (`$top`).
    pub page_size: u32,
}

impl MicrosoftConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_AUTHORITY: &'static str = "https://login.microsoftonline.com";

    pub const DEFAULT_GRAPH_BASE: &'static str = "https://graph.microsoft.com/v1.0";

    pub const DEFAULT_TOKEN_FILE: &'static str = "token_cache.json";

    pub const DEFAULT_PAGE_SIZE: u32 = 500;

    /// Graph caps `$top` for calendarView.
    pub const MAX_PAGE_SIZE: u32 = 1000;

    /// `offline_access` is what makes the token endpoint return a refresh token.
    pub const DEFAULT_SCOPES: [&'static str; 2] = ["offline_access", "Calendars.ReadWrite"];

    /// Creates a new configuration with the given credentials.
    pub fn new(credentials: MicrosoftCredentials) -> Self {
        Self {
            credentials,
            authority: Self::DEFAULT_AUTHORITY.to_string(),
            graph_base: Self::DEFAULT_GRAPH_BASE.to_string(),
            token_path: PathBuf::from(Self::DEFAULT_TOKEN_FILE),
            scopes: Self::DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the identity platform host.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = trim_slash(authority.into());
        self
    }

    /// Sets the Graph API root.
    pub fn with_graph_base(mut self, graph_base: impl Into<String>) -> Self {
        self.graph_base = trim_slash(graph_base.into());
        self
    }

    /// Sets the token storage path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the calendarView page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Device authorization endpoint for the configured tenant.
    pub fn device_code_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.authority, self.credentials.tenant_id
        )
    }

    /// Token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.credentials.tenant_id
        )
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }

        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(format!(
                "page size must be between 1 and {}",
                Self::MAX_PAGE_SIZE
            ));
        }

        Ok(())
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
