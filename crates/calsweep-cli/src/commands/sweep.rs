//! The sweep itself: sign in, pick the calendar, list, delete, report.

use std::io::Write;

use calsweep_core::{TimeWindow, WindowZone};
use calsweep_providers::{AuthPrompt, CalendarProvider, EventQuery, SweepReport, run_sweep};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Reads `--start`/`--end` in `--timezone`, the configured zone, or the
/// system zone.
pub fn parse_window(cli: &Cli, config: &ClientConfig) -> ClientResult<TimeWindow> {
    let zone = match cli.timezone.as_deref().or(config.timezone.as_deref()) {
        Some(name) => name.parse::<WindowZone>()?,
        None => WindowZone::Local,
    };
    let (Some(start), Some(end)) = (cli.start.as_deref(), cli.end.as_deref()) else {
        return Err(ClientError::Config(
            "--start and --end are required unless --clean is given".to_string(),
        ));
    };

    let window = TimeWindow::parse_local(start, end, zone)?;
    debug!(%zone, "sweeping {}", window);
    Ok(window)
}

/// Runs one sweep against `provider` and prints the outcome to `out`.
///
/// Sign-in, calendar and listing failures end the run. Failed deletes are
/// printed and returned in the report.
pub async fn run(
    provider: &dyn CalendarProvider,
    prompt: &dyn AuthPrompt,
    calendar: Option<&str>,
    window: TimeWindow,
    max_events: usize,
    out: &mut impl Write,
) -> ClientResult<SweepReport> {
    provider.authenticate(prompt).await?;

    let calendar = provider.resolve_calendar(calendar).await?;
    info!(calendar_id = %calendar.id, "using calendar {}", calendar.name);

    writeln!(out, "Fetching calendar events...")?;
    let query = EventQuery::new(calendar.id, window).with_max_events(max_events);
    let mut found = Ok(());
    let report = run_sweep(provider, &query, |events| {
        found = writeln!(out, "Found {} events to delete.", events.len());
    })
    .await?;
    found?;

    print_report(&report, out)?;
    Ok(report)
}

fn print_report(report: &SweepReport, out: &mut impl Write) -> std::io::Result<()> {
    for failure in &report.failures {
        writeln!(out, "Could not delete event {}", failure)?;
    }
    writeln!(out, "Deleted {} events.", report.deleted)?;
    if !report.is_complete() {
        writeln!(
            out,
            "{} of {} events could not be deleted; run again to retry them.",
            report.failures.len(),
            report.found
        )?;
    }
    Ok(())
}
