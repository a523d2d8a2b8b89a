//! Google sign-in through a loopback redirect with PKCE.
//!
//! A listener on `127.0.0.1` starts accepting before the consent URL is shown,
//! so the browser redirect always finds it. The code returned on `/callback`
//! is only exchanged when its `state` matches the one we sent.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::auth::{AuthPrompt, BrowserAuthorization, OAuthFlow, RefreshOutcome};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;
use crate::tokens::{TokenInfo, TokenReply, post_token_form};

use super::config::{GoogleConfig, OAuthCredentials};

/// Random bytes behind a verifier; 43 characters once encoded.
const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;

/// How long the user has to finish in the browser.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

type CallbackResult = ProviderResult<(String, String)>;

/// Installed-app sign-in and refresh for Google.
#[derive(Debug)]
pub struct LoopbackFlow {
    credentials: OAuthCredentials,
    auth_url: String,
    token_url: String,
    scopes: Vec<String>,
    port_range: (u16, u16),
    http_client: reqwest::Client,
}

impl LoopbackFlow {
    pub fn new(config: &GoogleConfig, http_client: reqwest::Client) -> Self {
        Self {
            credentials: config.credentials.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            port_range: config.loopback_ports,
            http_client,
        }
    }

    /// Interactive sign-in. Fails when no loopback port is free, when consent
    /// is denied or times out, on a state mismatch, or when the code exchange
    /// is refused.
    pub async fn authorize(&self, prompt: &dyn AuthPrompt) -> ProviderResult<TokenInfo> {
        let pkce = PkceChallenge::generate();

        let listener = bind_loopback_server(self.port_range)?;
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::internal(format!("failed to read listener address: {}", e)))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);

        // Accept before prompting so a redirect can never race the listener.
        let callback = spawn_callback_listener(listener)?;

        let request = BrowserAuthorization {
            url: pkce.consent_url(
                &self.auth_url,
                &self.credentials.client_id,
                &redirect_uri,
                &self.scopes,
            )?,
            redirect_uri: redirect_uri.clone(),
        };
        debug!("authorization URL: {}", request.url);
        prompt.browser_authorization(&request).await?;

        info!("waiting for browser authorization");
        let (code, received_state) = match tokio::time::timeout(CALLBACK_TIMEOUT, callback).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(ProviderError::internal("callback listener stopped")),
            Err(_) => return Err(ProviderError::authentication("OAuth callback timeout")),
        };

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "redirect state does not match the request; refusing the code",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri).await
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ProviderResult<TokenInfo> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        match post_token_form(&self.http_client, &self.token_url, &params).await? {
            TokenReply::Granted(token) => {
                info!("successfully obtained tokens");
                Ok(token.into_token_info(&self.scopes))
            }
            TokenReply::Rejected(error) => Err(ProviderError::authentication(format!(
                "token exchange failed: {}",
                error.describe()
            ))),
        }
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshOutcome> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        Ok(
            match post_token_form(&self.http_client, &self.token_url, &params).await? {
                TokenReply::Granted(token) => RefreshOutcome::Refreshed(token),
                TokenReply::Rejected(error) => RefreshOutcome::Rejected(error.describe()),
            },
        )
    }
}

impl OAuthFlow for LoopbackFlow {
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

/// Binds a TCP listener on the first available port in the given range.
fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<TcpListener> {
    for port in port_range.0..=port_range.1 {
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                debug!("bound loopback server on port {}", port);
                return Ok(listener);
            }
            Err(_) => continue,
        }
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Accepts connections on a helper thread until one carries the callback.
fn spawn_callback_listener(
    listener: TcpListener,
) -> ProviderResult<oneshot::Receiver<CallbackResult>> {
    listener
        .set_nonblocking(false)
        .map_err(|e| ProviderError::internal(format!("failed to set blocking: {}", e)))?;

    let (tx, rx) = oneshot::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    });
    Ok(rx)
}

/// Handles an incoming HTTP request on the callback server.
///
/// Returns `None` for requests that are not the OAuth redirect (favicons,
/// probes), so the listener keeps waiting.
fn handle_callback(mut stream: TcpStream) -> Option<CallbackResult> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();

    if reader.read_line(&mut request_line).is_err() {
        return None;
    }

    // Drain the headers; closing with unread input resets the connection.
    let mut header = String::new();
    while reader.read_line(&mut header).is_ok_and(|n| n > 2) {
        header.clear();
    }

    // GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(path)) = (parts.next(), parts.next()) else {
        return None;
    };
    if !path.starts_with("/callback") {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return None;
    }

    let query = path.split_once('?').map_or("", |(_, q)| q);
    let params = parse_query(query);
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    let (code, state, error) = (get("code"), get("state"), get("error"));

    let response = if error.is_some() || code.is_none() {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>calsweep was not signed in</h1>\
        <p>Check the terminal for details.</p></body></html>"
    } else {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>calsweep is signed in</h1>\
        <p>This tab can be closed.</p></body></html>"
    };

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match code {
        Some(code) => Some(Ok((code, state.unwrap_or_default()))),
        None => Some(Err(ProviderError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// One sign-in attempt's verifier, its S256 challenge, and the `state` nonce.
#[derive(Debug)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = random_token(VERIFIER_BYTES);
        Self {
            challenge: s256(&verifier),
            state: random_token(STATE_BYTES),
            verifier,
        }
    }

    /// Google's consent page for this attempt.
    ///
    /// `access_type=offline` plus `prompt=consent` gets a refresh token back
    /// even from accounts that already granted access once.
    pub fn consent_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<String> {
        let scope = scopes.join(" ");
        let url = url::Url::parse_with_params(
            auth_url,
            [
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| {
            ProviderError::configuration(format!("invalid auth URL {:?}: {}", auth_url, e))
        })?;
        Ok(url.into())
    }
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
