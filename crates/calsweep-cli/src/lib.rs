//! The `msgraph-sweep` and `gcal-sweep` programs.
//!
//! Both binaries are thin wrappers around [`main`]: they differ only in the
//! [`ProviderKind`] they pass.

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod prompt;
pub mod providers;
pub mod secret;

use std::io::Write;
use std::process::ExitCode;

use calsweep_core::{TracingConfig, init_tracing};
use calsweep_providers::AuthPrompt;

pub use cli::{Cli, ProviderKind};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};

use credentials::{InquirePrompter, Prompter};
use prompt::ConsolePrompt;
use secret::{Environment, ProcessEnv};

/// The outside world a run talks to.
pub struct Session<'a> {
    /// Environment variables.
    pub env: &'a dyn Environment,
    /// Asks for credentials nothing else provided.
    pub prompter: &'a dyn Prompter,
    /// Shows sign-in challenges.
    pub auth_prompt: &'a dyn AuthPrompt,
}

/// Runs one invocation to completion.
pub async fn run(
    kind: ProviderKind,
    cli: &Cli,
    session: &Session<'_>,
    out: &mut impl Write,
) -> ClientResult<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;

    if cli.clean {
        let path = providers::token_cache_path(kind, cli, &config);
        return commands::clean::run(&path, out);
    }

    // Arguments are checked before credentials are asked for or the network is touched.
    if kind == ProviderKind::Microsoft && cli.calendar.is_some() {
        return Err(ClientError::Config(
            "--calendar is not supported for Microsoft, sweeps use the default calendar"
                .to_string(),
        ));
    }
    let window = commands::sweep::parse_window(cli, &config)?;
    let provider = providers::build(kind, cli, &config, session.env, session.prompter)?;

    commands::sweep::run(
        provider.as_ref(),
        session.auth_prompt,
        cli.calendar.as_deref(),
        window,
        config.max_events(cli.max_events),
        out,
    )
    .await?;
    Ok(())
}

/// Entry point shared by both binaries.
pub async fn main(kind: ProviderKind) -> ExitCode {
    // Loaded before parsing so `CALSWEEP_CONFIG` can come from `.env`.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_for(kind);

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    let session = Session {
        env: &ProcessEnv,
        prompter: &InquirePrompter,
        auth_prompt: &ConsolePrompt,
    };

    match run(kind, &cli, &session, &mut std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
