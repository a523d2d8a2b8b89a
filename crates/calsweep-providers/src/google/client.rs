//! Calendar API v3 requests: event listing, the calendar list, and deletes.
//!
//! Callers hand in a fresh access token per call; refreshing it is the
//! provider's job.

use calsweep_core::{EventTime, TimeWindow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ProviderErrorCode, ProviderResult, transport_error};
use crate::http::{read_json, status_error};
use crate::provider::{CalendarEvent, DeleteOutcome, EventPage};

#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    page_size: u32,
}

impl GoogleCalendarClient {
    pub fn new(http_client: reqwest::Client, api_base: impl Into<String>, page_size: u32) -> Self {
        Self {
            http_client,
            api_base: api_base.into(),
            page_size,
        }
    }

    fn calendar_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    /// GETs one page of a paginated collection.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        params: &[(&str, String)],
        page_token: Option<&str>,
        what: &str,
    ) -> ProviderResult<T> {
        let mut request = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .query(params);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;
        if !response.status().is_success() {
            return Err(status_error(response, what).await);
        }
        read_json(response, what).await
    }

    /// One page of events overlapping `window`, recurrences expanded into instances.
    pub async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let rfc3339 = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let params = [
            ("timeMin", rfc3339(&window.start)),
            ("timeMax", rfc3339(&window.end)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", self.page_size.to_string()),
        ];

        let page: Listing<WireEvent> = self
            .get_page(
                &format!("{}/events", self.calendar_url(calendar_id)),
                access_token,
                &params,
                page_token,
                "list events",
            )
            .await?;

        Ok(EventPage {
            events: page
                .items
                .into_iter()
                .filter_map(WireEvent::into_event)
                .collect(),
            next_cursor: page.next_page_token,
        })
    }

    /// One page of the signed-in user's calendar list.
    pub async fn list_calendars_page(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<(Vec<CalendarListEntry>, Option<String>)> {
        let page: Listing<CalendarListEntry> = self
            .get_page(
                &format!("{}/users/me/calendarList", self.api_base),
                access_token,
                &[],
                page_token,
                "list calendars",
            )
            .await?;
        Ok((page.items, page.next_page_token))
    }

    /// 404 and 410 come back as [`DeleteOutcome::AlreadyGone`].
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<DeleteOutcome> {
        let url = format!(
            "{}/events/{}",
            self.calendar_url(calendar_id),
            urlencoding::encode(event_id)
        );

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error("delete event", e))?;
        if response.status().is_success() {
            return Ok(DeleteOutcome::Deleted);
        }

        match status_error(response, "delete event").await {
            err if err.code() == ProviderErrorCode::NotFound => {
                debug!(event_id, "event already gone");
                Ok(DeleteOutcome::AlreadyGone)
            }
            err => Err(err),
        }
    }
}

/// Shape shared by `events.list` and `calendarList.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    #[serde(default)]
    start: WireStart,
}

/// Timed events carry `dateTime`, all-day events carry `date`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStart {
    date_time: Option<String>,
    date: Option<String>,
}

impl WireEvent {
    /// `None` for cancelled instances and for starts that cannot be read.
    fn into_event(self) -> Option<CalendarEvent> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }

        let start = if let Some(stamp) = &self.start.date_time {
            match DateTime::parse_from_rfc3339(stamp) {
                Ok(at) => EventTime::from_utc(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!(event_id = %self.id, "skipping event with unreadable start {:?}: {}", stamp, e);
                    return None;
                }
            }
        } else if let Some(day) = &self.start.date {
            match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                Ok(day) => EventTime::from_date(day),
                Err(e) => {
                    warn!(event_id = %self.id, "skipping event with unreadable date {:?}: {}", day, e);
                    return None;
                }
            }
        } else {
            warn!(event_id = %self.id, "skipping event without a start");
            return None;
        };

        Some(CalendarEvent {
            id: self.id,
            start,
            summary: self.summary.filter(|s| !s.is_empty()),
        })
    }
}

/// An entry of the user's calendar list.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarListEntry {
    pub id: String,
    /// Display name, matched against `--calendar`.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}
