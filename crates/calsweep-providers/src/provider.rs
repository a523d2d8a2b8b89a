//! CalendarProvider trait definition.
//!
//! This module defines the [`CalendarProvider`] trait, the abstraction the
//! sweep pipeline drives. Providers are responsible for:
//! - Authenticating (cached token, refresh or interactive sign-in)
//! - Resolving the calendar to sweep
//! - Listing one page of events at a time
//! - Deleting a single event
//!
//! Paging, client-side window filtering and the event cap are shared and
//! live in the provided [`CalendarProvider::find_events`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use calsweep_core::{EventTime, TimeWindow};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::auth::AuthPrompt;
use crate::error::ProviderResult;
use crate::retry::{RetryPolicy, retry_rate_limited};

/// Information about a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    /// Identifier used in API paths.
    pub id: String,
    /// Human-readable name of the calendar.
    pub name: String,
    /// Whether this is the account's primary calendar.
    pub is_primary: bool,
}

impl CalendarInfo {
    /// Creates a new CalendarInfo with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_primary: false,
        }
    }

    /// Builder method to mark as primary.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }
}

/// A calendar entry as listed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Provider event id, used for the delete request.
    pub id: String,
    /// When the event starts.
    pub start: EventTime,
    /// The event title, if it has one.
    pub summary: Option<String>,
}

impl CalendarEvent {
    pub fn new(id: impl Into<String>, start: EventTime) -> Self {
        Self {
            id: id.into(),
            start,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}",
            self.summary.as_deref().unwrap_or("(no title)"),
            self.start
        )
    }
}

/// One page of a provider listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events on this page, as the provider returned them.
    pub events: Vec<CalendarEvent>,
    /// Opaque continuation for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// What to list.
#[derive(Debug, Clone)]
pub struct EventQuery {
    /// Calendar to list from, as resolved by [`CalendarProvider::resolve_calendar`].
    pub calendar_id: String,
    /// Only events starting inside this window are yielded.
    pub window: TimeWindow,
    /// Stop after this many matches.
    pub max_events: Option<usize>,
}

impl EventQuery {
    pub fn new(calendar_id: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            window,
            max_events: None,
        }
    }

    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = Some(max);
        self
    }
}

/// How a delete request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The provider removed the event.
    Deleted,
    /// The event no longer existed (404/410).
    AlreadyGone,
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe, so the CLI can hold a
/// `Box<dyn CalendarProvider>` regardless of the backend.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
enum PageState {
    First,
    Next(String),
    Done,
}

/// The core abstraction for calendar providers.
///
/// # Example Implementation
///
/// ```ignore
/// impl CalendarProvider for MicrosoftProvider {
///     fn name(&self) -> &str { "microsoft" }
///
///     fn fetch_page<'a>(&'a self, query: &'a EventQuery, cursor: Option<String>)
///         -> BoxFuture<'a, ProviderResult<EventPage>>
///     {
///         Box::pin(async move {
///             // GET calendarView or follow the nextLink in `cursor`
///             Ok(page)
///         })
///     }
///     // ... other methods
/// }
/// ```
pub trait CalendarProvider: Send + Sync {
    /// Returns the name of this provider ("microsoft", "google").
    fn name(&self) -> &str;

    /// Obtains a usable access token, prompting through `prompt` only when
    /// neither the cache nor a refresh can provide one.
    fn authenticate<'a>(&'a self, prompt: &'a dyn AuthPrompt) -> BoxFuture<'a, ProviderResult<()>>;

    /// Checks if the provider holds a valid, unexpired token.
    fn is_authenticated(&self) -> bool;

    /// Resolves a calendar name to the calendar to sweep.
    ///
    /// `None` selects the account's default calendar.
    ///
    /// # Errors
    ///
    /// Returns a `calendar_error` if no calendar carries the given name.
    fn resolve_calendar<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>>;

    /// Fetches one page of events overlapping `query.window`.
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// `next_cursor` afterwards. No client-side filtering happens here.
    fn fetch_page<'a>(
        &'a self,
        query: &'a EventQuery,
        cursor: Option<String>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>>;

    /// Deletes one event.
    ///
    /// An event that is already gone is reported as
    /// [`DeleteOutcome::AlreadyGone`], not as an error.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<DeleteOutcome>>;

    /// Retry policy for rate-limited list and delete requests.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Pause between consecutive deletes to stay under throttling limits.
    fn suggested_delete_interval(&self) -> Duration {
        Duration::from_millis(50)
    }

    /// Streams every event whose start lies in `query.window`.
    ///
    /// Pages are fetched lazily as the stream is polled. The stream ends
    /// after the last page, after `query.max_events` matches, or after the
    /// first error.
    fn find_events<'a>(
        &'a self,
        query: &'a EventQuery,
    ) -> BoxStream<'a, ProviderResult<CalendarEvent>> {
        let policy = self.retry_policy();

        let pages = stream::try_unfold(PageState::First, move |state| async move {
            let cursor = match state {
                PageState::Done => return Ok(None),
                PageState::First => None,
                PageState::Next(cursor) => Some(cursor),
            };
            let page =
                retry_rate_limited(&policy, || self.fetch_page(query, cursor.clone())).await?;
            tracing::debug!(
                provider = self.name(),
                events = page.events.len(),
                more = page.next_cursor.is_some(),
                "fetched page"
            );
            let next = match page.next_cursor {
                Some(cursor) => PageState::Next(cursor),
                None => PageState::Done,
            };
            Ok(Some((page.events, next)))
        });

        let matching = pages
            .map_ok(|events| stream::iter(events.into_iter().map(Ok)))
            .try_flatten()
            .try_filter(move |event| {
                futures_util::future::ready(query.window.contains_start(&event.start))
            });

        match query.max_events {
            Some(max) => matching.take(max).boxed(),
            None => matching.boxed(),
        }
    }
}
