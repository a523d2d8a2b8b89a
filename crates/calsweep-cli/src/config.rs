//! Client configuration.
//!
//! All settings live in an optional `config.toml` file at
//! `~/.config/calsweep/config.toml` by default, overridable with `--config`
//! or `CALSWEEP_CONFIG`. Every field is optional; command-line flags and
//! environment variables take precedence.
//!
//! Credential values (`client_id`, `tenant_id`, `client_secret`) support
//! secret references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Default cap on matched events per run.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Configuration shared by both sweep programs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// IANA timezone used to read `--start` / `--end`.
    pub timezone: Option<String>,

    /// Cap on matched events per run.
    pub max_events: Option<usize>,

    /// Microsoft Graph settings.
    pub microsoft: Option<MicrosoftSettings>,

    /// Google Calendar settings.
    pub google: Option<GoogleSettings>,
}

/// `[microsoft]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MicrosoftSettings {
    /// Application (client) ID.
    pub client_id: Option<String>,

    /// Directory (tenant) ID or domain.
    pub tenant_id: Option<String>,

    /// Client secret, for confidential app registrations.
    pub client_secret: Option<String>,

    /// Token cache location.
    pub token_cache: Option<PathBuf>,

    /// Identity platform root, e.g. a sovereign cloud login host.
    pub authority: Option<String>,

    /// Graph API root.
    pub graph_base: Option<String>,
}

/// `[google]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleSettings {
    /// OAuth client ID.
    pub client_id: Option<String>,

    /// OAuth client secret.
    pub client_secret: Option<String>,

    /// Installed-app credentials downloaded from the Cloud Console.
    pub credentials_file: Option<PathBuf>,

    /// Token cache location.
    pub token_cache: Option<PathBuf>,

    /// Consent page URL.
    pub auth_url: Option<String>,

    /// Token endpoint URL.
    pub token_url: Option<String>,

    /// Calendar API root.
    pub api_base: Option<String>,
}

impl ClientConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and an empty configuration otherwise.
    pub fn load(explicit: Option<&Path>) -> ClientResult<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("no config file at {}", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsweep")
            .join("config.toml")
    }

    /// The event cap, from the command line, then this file, then the default.
    pub fn max_events(&self, flag: Option<usize>) -> usize {
        flag.or(self.max_events).unwrap_or(DEFAULT_MAX_EVENTS)
    }
}
