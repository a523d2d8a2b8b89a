//! The list-then-delete pass.

use std::fmt;
use std::time::Duration;

use futures_util::TryStreamExt;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{CalendarEvent, CalendarProvider, DeleteOutcome, EventQuery};
use crate::retry::{RetryPolicy, retry_rate_limited};

/// A delete that did not go through.
#[derive(Debug)]
pub struct DeleteFailure {
    pub event_id: String,
    pub summary: Option<String>,
    pub error: ProviderError,
}

impl fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.summary {
            Some(summary) => write!(f, "{} ({}): {}", self.event_id, summary, self.error),
            None => write!(f, "{}: {}", self.event_id, self.error),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Events matched by the finder.
    pub found: usize,
    /// Events removed, including ones that were already gone.
    pub deleted: usize,
    /// Of `deleted`, how many were already gone.
    pub already_gone: usize,
    /// Events that could not be deleted, in listing order.
    pub failures: Vec<DeleteFailure>,
}

impl SweepReport {
    /// Returns true if every matched event was deleted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Issues one delete per event, in order, and never stops early.
pub struct Deleter<'a> {
    provider: &'a dyn CalendarProvider,
    interval: Duration,
    policy: RetryPolicy,
}

impl<'a> Deleter<'a> {
    /// Creates a deleter using the provider's throttle interval and retry policy.
    pub fn new(provider: &'a dyn CalendarProvider) -> Self {
        Self {
            provider,
            interval: provider.suggested_delete_interval(),
            policy: provider.retry_policy(),
        }
    }

    /// Overrides the pause between deletes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Deletes every event from `calendar_id`.
    ///
    /// Failures are logged and collected; they never abort the loop.
    pub async fn delete_all(&self, calendar_id: &str, events: &[CalendarEvent]) -> SweepReport {
        let mut report = SweepReport {
            found: events.len(),
            ..SweepReport::default()
        };

        for (i, event) in events.iter().enumerate() {
            if i > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }

            let result = retry_rate_limited(&self.policy, || {
                self.provider.delete_event(calendar_id, &event.id)
            })
            .await;

            match result {
                Ok(DeleteOutcome::Deleted) => {
                    info!(event_id = %event.id, "deleted {}", event);
                    report.deleted += 1;
                }
                Ok(DeleteOutcome::AlreadyGone) => {
                    debug!(event_id = %event.id, "already gone: {}", event);
                    report.deleted += 1;
                    report.already_gone += 1;
                }
                Err(error) => {
                    warn!(event_id = %event.id, "failed to delete {}: {}", event, error);
                    report.failures.push(DeleteFailure {
                        event_id: event.id.clone(),
                        summary: event.summary.clone(),
                        error,
                    });
                }
            }
        }

        report
    }
}

/// Lists every matching event before anything is deleted.
///
/// Deleting while paging would shift offset-based cursors and skip events.
pub async fn collect_events(
    provider: &dyn CalendarProvider,
    query: &EventQuery,
) -> ProviderResult<Vec<CalendarEvent>> {
    let events: Vec<CalendarEvent> = provider.find_events(query).try_collect().await?;
    if query.max_events.is_some_and(|max| events.len() >= max) {
        warn!(
            "stopped listing at the cap of {} events, run again to continue",
            events.len()
        );
    }
    Ok(events)
}

/// Finds and deletes every event of `query`.
///
/// `on_found` sees the full listing before the first delete is sent.
pub async fn run_sweep(
    provider: &dyn CalendarProvider,
    query: &EventQuery,
    on_found: impl FnOnce(&[CalendarEvent]),
) -> ProviderResult<SweepReport> {
    info!(
        provider = provider.name(),
        calendar = %query.calendar_id,
        "searching for events starting in {}",
        query.window
    );
    let events = collect_events(provider, query).await?;
    info!("found {} matching events", events.len());
    on_found(&events);

    let report = Deleter::new(provider)
        .delete_all(&query.calendar_id, &events)
        .await;

    info!(
        deleted = report.deleted,
        failed = report.failures.len(),
        "sweep finished"
    );
    Ok(report)
}
