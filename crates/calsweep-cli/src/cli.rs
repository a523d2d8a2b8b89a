//! Command-line interface definition.

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

/// Which calendar backend a program talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Microsoft Graph (`msgraph-sweep`).
    Microsoft,
    /// Google Calendar (`gcal-sweep`).
    Google,
}

impl ProviderKind {
    /// The binary name.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Microsoft => "msgraph-sweep",
            Self::Google => "gcal-sweep",
        }
    }

    fn about(&self) -> &'static str {
        match self {
            Self::Microsoft => {
                "Delete every Outlook calendar event that starts inside a time window"
            }
            Self::Google => "Delete every Google Calendar event that starts inside a time window",
        }
    }
}

/// Bulk-delete calendar events that start inside a time window.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Window start, inclusive ("YYYY-MM-DD HH:MM")
    #[arg(
        long,
        value_name = "YYYY-MM-DD HH:MM",
        required_unless_present = "clean",
        conflicts_with = "clean"
    )]
    pub start: Option<String>,

    /// Window end, exclusive ("YYYY-MM-DD HH:MM")
    #[arg(
        long,
        value_name = "YYYY-MM-DD HH:MM",
        required_unless_present = "clean",
        conflicts_with = "clean"
    )]
    pub end: Option<String>,

    /// Calendar name (Google only, defaults to the primary calendar)
    #[arg(long, conflicts_with = "clean")]
    pub calendar: Option<String>,

    /// IANA timezone for --start/--end instead of the system zone
    #[arg(long, value_name = "IANA")]
    pub timezone: Option<String>,

    /// Token cache file
    #[arg(long, value_name = "PATH")]
    pub token_cache: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short, env = "CALSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop listing after this many matching events [default: 10000]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub max_events: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Delete the token cache and exit
    #[arg(long)]
    pub clean: bool,
}

impl Cli {
    /// Parses the process arguments under the program's own name.
    pub fn parse_for(kind: ProviderKind) -> Self {
        let matches = Self::command_for(kind).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Parses an explicit argument list, for tests.
    pub fn try_parse_for<I, T>(kind: ProviderKind, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command_for(kind).try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }

    fn command_for(kind: ProviderKind) -> clap::Command {
        Self::command().name(kind.program()).about(kind.about())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_for(ProviderKind::Google, args.iter().copied())
    }

    #[test]
    fn window_flags() {
        let cli = parse(&[
            "gcal-sweep",
            "--start",
            "2024-01-01 00:00",
            "--end",
            "2024-01-02 00:00",
            "--calendar",
            "Flows",
        ])
        .unwrap();
        assert_eq!(cli.start.as_deref(), Some("2024-01-01 00:00"));
        assert_eq!(cli.end.as_deref(), Some("2024-01-02 00:00"));
        assert_eq!(cli.calendar.as_deref(), Some("Flows"));
        assert!(!cli.clean);
        assert!(cli.max_events.is_none());
    }

    #[test]
    fn start_and_end_are_required_without_clean() {
        assert!(parse(&["gcal-sweep"]).is_err());
        assert!(parse(&["gcal-sweep", "--start", "2024-01-01 00:00"]).is_err());
    }

    #[test]
    fn clean_alone_is_accepted() {
        let cli = parse(&["gcal-sweep", "--clean"]).unwrap();
        assert!(cli.clean);
        assert!(cli.start.is_none());
    }

    #[test]
    fn clean_conflicts_with_window() {
        let err = parse(&["gcal-sweep", "--clean", "--start", "2024-01-01 00:00"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn max_events_must_be_a_number() {
        assert!(
            parse(&[
                "gcal-sweep",
                "--start",
                "2024-01-01 00:00",
                "--end",
                "2024-01-02 00:00",
                "--max-events",
                "lots",
            ])
            .is_err()
        );
    }

    #[test]
    fn program_names() {
        assert_eq!(ProviderKind::Microsoft.program(), "msgraph-sweep");
        assert_eq!(
            Cli::command_for(ProviderKind::Google).get_name(),
            "gcal-sweep"
        );
    }

    #[test]
    fn verify_command() {
        Cli::command().debug_assert();
    }
}
