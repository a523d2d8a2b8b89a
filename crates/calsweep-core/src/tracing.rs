//! Tracing setup for the sweep programs.
//!
//! ```ignore
//! use calsweep_core::tracing::{init_tracing, TracingConfig};
//!
//! let config = if debug { TracingConfig::cli_debug() } else { TracingConfig::cli() };
//! init_tracing(config)?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target prefix shared by every crate in the workspace.
const TARGET_PREFIX: &str = "calsweep";

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// How much to log and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for `calsweep*` targets when `RUST_LOG` is unset.
    pub level: Level,
    /// Prefix lines with file, line, module and a timestamp.
    pub verbose_lines: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    /// Normal runs: one line per deleted event, nothing from dependencies.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::INFO,
            verbose_lines: false,
        }
    }

    /// `--debug` runs.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            verbose_lines: true,
        }
    }

    fn directive(&self) -> String {
        format!("{}={}", TARGET_PREFIX, self.level)
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(from_env) if !from_env.trim().is_empty() => Ok(EnvFilter::try_new(from_env)?),
            _ => Ok(EnvFilter::try_new(self.directive())?),
        }
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` replaces the default `calsweep=<level>` directive.
///
/// # Errors
///
/// Fails if a subscriber is already installed or `RUST_LOG` does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_file(config.verbose_lines)
        .with_line_number(config.verbose_lines)
        .with_target(config.verbose_lines);

    let layer = if config.verbose_lines {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(config.filter()?)
        .with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
