//! Credential resolution.
//!
//! Each field is looked up in the environment (a `.env` file in the working
//! directory is loaded first), then in `config.toml`, and finally asked for
//! interactively.

use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::secret::{self, Environment};

/// Asks the user for a missing value.
pub trait Prompter {
    /// Reads a visible value.
    fn text(&self, label: &str) -> Result<String, String>;
    /// Reads a value without echoing it.
    fn secret(&self, label: &str) -> Result<String, String>;
}

/// Terminal prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn text(&self, label: &str) -> Result<String, String> {
        inquire::Text::new(label).prompt().map_err(|e| e.to_string())
    }

    fn secret(&self, label: &str) -> Result<String, String> {
        inquire::Password::new(label)
            .without_confirmation()
            .prompt()
            .map_err(|e| e.to_string())
    }
}

/// Looks a field up in the environment, then in the config file.
fn lookup(
    env_var: &str,
    configured: Option<&str>,
    env: &dyn Environment,
) -> ClientResult<Option<String>> {
    if let Some(value) = env.var(env_var) {
        debug!("{} taken from the environment", env_var);
        return Ok(Some(value.trim().to_string()));
    }
    match configured.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let value = secret::resolve(raw, env)
                .map_err(|e| ClientError::Config(format!("{}: {}", env_var, e)))?;
            debug!("{} taken from the config file", env_var);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn ask(prompter: &dyn Prompter, label: &str, hidden: bool) -> ClientResult<String> {
    let answer = if hidden {
        prompter.secret(label)
    } else {
        prompter.text(label)
    };
    let answer =
        answer.map_err(|e| ClientError::Config(format!("could not read {}: {}", label, e)))?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ClientError::Config(format!("{} is required", label)));
    }
    Ok(answer.to_string())
}

fn required(
    env_var: &str,
    configured: Option<&str>,
    label: &str,
    env: &dyn Environment,
    prompter: &dyn Prompter,
) -> ClientResult<String> {
    match lookup(env_var, configured, env)? {
        Some(value) => Ok(value),
        None => ask(prompter, label, false),
    }
}

#[cfg(feature = "microsoft")]
pub use self::microsoft::microsoft_credentials;

#[cfg(feature = "microsoft")]
mod microsoft {
    use calsweep_providers::microsoft::MicrosoftCredentials;

    use super::*;
    use crate::config::MicrosoftSettings;

    /// Resolves the app registration for `msgraph-sweep`.
    ///
    /// `CLIENT_ID` and `TENANT_ID` are prompted for when missing;
    /// `CLIENT_SECRET` is optional and never prompted for.
    pub fn microsoft_credentials(
        settings: Option<&MicrosoftSettings>,
        env: &dyn Environment,
        prompter: &dyn Prompter,
    ) -> ClientResult<MicrosoftCredentials> {
        let client_id = required(
            "CLIENT_ID",
            settings.and_then(|s| s.client_id.as_deref()),
            "Enter client ID:",
            env,
            prompter,
        )?;
        let tenant_id = required(
            "TENANT_ID",
            settings.and_then(|s| s.tenant_id.as_deref()),
            "Enter tenant ID:",
            env,
            prompter,
        )?;

        let mut credentials = MicrosoftCredentials::new(client_id, tenant_id);
        if let Some(secret) = lookup(
            "CLIENT_SECRET",
            settings.and_then(|s| s.client_secret.as_deref()),
            env,
        )? {
            credentials = credentials.with_client_secret(secret);
        }

        credentials
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(credentials)
    }
}

#[cfg(feature = "google")]
pub use self::google::{DEFAULT_CREDENTIALS_FILE, google_credentials};

#[cfg(feature = "google")]
mod google {
    use std::path::{Path, PathBuf};

    use calsweep_providers::google::OAuthCredentials;

    use super::*;
    use crate::config::GoogleSettings;

    /// Credentials file picked up from the working directory.
    pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

    /// Resolves the OAuth client for `gcal-sweep`.
    ///
    /// A complete `GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET` pair wins. Otherwise
    /// a credentials file is read: `GOOGLE_CREDENTIALS_FILE`, the configured
    /// `credentials_file`, or `./credentials.json` when present. The user is
    /// prompted for whatever is still missing.
    pub fn google_credentials(
        settings: Option<&GoogleSettings>,
        env: &dyn Environment,
        prompter: &dyn Prompter,
    ) -> ClientResult<OAuthCredentials> {
        resolve(settings, env, prompter, Path::new(DEFAULT_CREDENTIALS_FILE))
    }

    pub(super) fn resolve(
        settings: Option<&GoogleSettings>,
        env: &dyn Environment,
        prompter: &dyn Prompter,
        fallback_file: &Path,
    ) -> ClientResult<OAuthCredentials> {
        let client_id = lookup(
            "GOOGLE_CLIENT_ID",
            settings.and_then(|s| s.client_id.as_deref()),
            env,
        )?;
        let client_secret = lookup(
            "GOOGLE_CLIENT_SECRET",
            settings.and_then(|s| s.client_secret.as_deref()),
            env,
        )?;

        let credentials = match (client_id, client_secret) {
            (Some(id), Some(secret)) => OAuthCredentials::new(id, secret),
            (id, secret) => {
                let file = env
                    .var("GOOGLE_CREDENTIALS_FILE")
                    .map(PathBuf::from)
                    .or_else(|| settings.and_then(|s| s.credentials_file.clone()))
                    .or_else(|| fallback_file.exists().then(|| fallback_file.to_path_buf()));

                match file {
                    Some(path) => {
                        debug!("reading Google credentials from {}", path.display());
                        OAuthCredentials::from_file(&path).map_err(ClientError::Config)?
                    }
                    None => {
                        let id = match id {
                            Some(id) => id,
                            None => ask(prompter, "Enter Google OAuth client ID:", false)?,
                        };
                        let secret = match secret {
                            Some(secret) => secret,
                            None => ask(prompter, "Enter Google OAuth client secret:", true)?,
                        };
                        OAuthCredentials::new(id, secret)
                    }
                }
            }
        };

        credentials
            .validate()
            .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;
        Ok(credentials)
    }
}
