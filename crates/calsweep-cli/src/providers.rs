//! Builds the calendar provider a program talks to.

use std::path::PathBuf;

use calsweep_providers::CalendarProvider;

use crate::cli::{Cli, ProviderKind};
use crate::config::ClientConfig;
use crate::credentials::Prompter;
use crate::error::{ClientError, ClientResult};
use crate::secret::Environment;

/// The token cache file: `--token-cache`, then the config file, then the
/// provider's default in the working directory.
pub fn token_cache_path(kind: ProviderKind, cli: &Cli, config: &ClientConfig) -> PathBuf {
    if let Some(path) = &cli.token_cache {
        return path.clone();
    }
    let configured = match kind {
        ProviderKind::Microsoft => config.microsoft.as_ref().and_then(|m| m.token_cache.clone()),
        ProviderKind::Google => config.google.as_ref().and_then(|g| g.token_cache.clone()),
    };
    configured.unwrap_or_else(|| PathBuf::from(default_token_file(kind)))
}

fn default_token_file(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Microsoft => "token_cache.json",
        ProviderKind::Google => "token.json",
    }
}

/// Resolves credentials and creates the provider.
///
/// No network traffic happens here; sign-in is left to the caller.
pub fn build(
    kind: ProviderKind,
    cli: &Cli,
    config: &ClientConfig,
    env: &dyn Environment,
    prompter: &dyn Prompter,
) -> ClientResult<Box<dyn CalendarProvider>> {
    let token_path = token_cache_path(kind, cli, config);
    match kind {
        #[cfg(feature = "microsoft")]
        ProviderKind::Microsoft => microsoft(config, token_path, env, prompter),
        #[cfg(feature = "google")]
        ProviderKind::Google => google(config, token_path, env, prompter),
        #[allow(unreachable_patterns)]
        other => Err(ClientError::Config(format!(
            "{} support was not compiled in",
            other.program()
        ))),
    }
}

#[cfg(feature = "microsoft")]
fn microsoft(
    config: &ClientConfig,
    token_path: PathBuf,
    env: &dyn Environment,
    prompter: &dyn Prompter,
) -> ClientResult<Box<dyn CalendarProvider>> {
    use calsweep_providers::microsoft::{MicrosoftConfig, MicrosoftProvider};

    let settings = config.microsoft.as_ref();
    let credentials = crate::credentials::microsoft_credentials(settings, env, prompter)?;

    let mut provider_config = MicrosoftConfig::new(credentials).with_token_path(token_path);
    if let Some(settings) = settings {
        if let Some(ref authority) = settings.authority {
            provider_config = provider_config.with_authority(authority);
        }
        if let Some(ref graph_base) = settings.graph_base {
            provider_config = provider_config.with_graph_base(graph_base);
        }
    }

    Ok(Box::new(MicrosoftProvider::new(provider_config)?))
}

#[cfg(feature = "google")]
fn google(
    config: &ClientConfig,
    token_path: PathBuf,
    env: &dyn Environment,
    prompter: &dyn Prompter,
) -> ClientResult<Box<dyn CalendarProvider>> {
    use calsweep_providers::google::{GoogleConfig, GoogleProvider};

    let settings = config.google.as_ref();
    let credentials = crate::credentials::google_credentials(settings, env, prompter)?;

    let mut provider_config = GoogleConfig::new(credentials).with_token_path(token_path);
    if let Some(settings) = settings {
        if settings.auth_url.is_some() || settings.token_url.is_some() {
            provider_config = provider_config.with_oauth_endpoints(
                settings
                    .auth_url
                    .clone()
                    .unwrap_or_else(|| GoogleConfig::DEFAULT_AUTH_URL.to_string()),
                settings
                    .token_url
                    .clone()
                    .unwrap_or_else(|| GoogleConfig::DEFAULT_TOKEN_URL.to_string()),
            );
        }
        if let Some(ref api_base) = settings.api_base {
            provider_config = provider_config.with_api_base(api_base);
        }
    }

    Ok(Box::new(GoogleProvider::new(provider_config)?))
}
