//! Microsoft Graph calendar client.
//!
//! Low-level HTTP calls for the two Graph endpoints the sweep needs:
//! `calendarView` for listing and `events/{id}` for deleting.

use chrono::{NaiveDateTime, SecondsFormat};
use calsweep_core::{EventTime, TimeWindow};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderErrorCode, ProviderResult, transport_error};
use crate::http::{read_json, status_error};
use crate::provider::{CalendarEvent, DeleteOutcome, EventPage};

/// Fields requested for each event.
const SELECT_FIELDS: &str = "id,subject,start,end";

/// Makes Graph report `start.dateTime` in UTC.
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

/// Graph returns `2024-01-01T09:00:00.0000000`, without offset.
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Microsoft Graph API client.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl GraphClient {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>, page_size: u32) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            page_size,
        }
    }

    /// Fetches one page of the signed-in user's calendar view.
    ///
    /// With no `next_link` this queries `window`; otherwise it follows the
    /// `@odata.nextLink` from the previous page verbatim.
    pub async fn calendar_view_page(
        &self,
        access_token: &str,
        window: &TimeWindow,
        next_link: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let request = match next_link {
            Some(link) => self.http_client.get(link),
            None => self
                .http_client
                .get(format!("{}/me/calendarView", self.base_url))
                .query(&[
                    (
                        "startDateTime",
                        window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ),
                    (
                        "endDateTime",
                        window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ),
                    ("$top", self.page_size.to_string()),
                    ("$select", SELECT_FIELDS.to_string()),
                    ("$orderby", "start/dateTime".to_string()),
                ]),
        };

        let response = request
            .bearer_auth(access_token)
            .header("Prefer", PREFER_UTC)
            .send()
            .await
            .map_err(|e| transport_error("calendarView request failed", e))?;

        if !response.status().is_success() {
            return Err(status_error(response, "calendarView").await);
        }

        let page: CalendarViewResponse = read_json(response, "calendarView").await?;
        let events = page
            .value
            .into_iter()
            .filter_map(convert_event)
            .collect();

        Ok(EventPage {
            events,
            next_cursor: page.next_link,
        })
    }

    /// Deletes an event from the signed-in user's mailbox.
    pub async fn delete_event(
        &self,
        access_token: &str,
        event_id: &str,
    ) -> ProviderResult<DeleteOutcome> {
        let url = format!(
            "{}/me/events/{}",
            self.base_url,
            urlencoding::encode(event_id)
        );

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error("delete request failed", e))?;

        if response.status().is_success() {
            return Ok(DeleteOutcome::Deleted);
        }

        let err = status_error(response, "delete event").await;
        if err.code() == ProviderErrorCode::NotFound {
            debug!(event_id, "event already gone");
            return Ok(DeleteOutcome::AlreadyGone);
        }
        Err(err)
    }
}

/// Converts a Graph event, skipping entries whose start cannot be read.
fn convert_event(event: GraphEvent) -> Option<CalendarEvent> {
    let start = parse_graph_start(&event.start)
        .map_err(|e| warn!("skipping event {}: {}", event.id, e))
        .ok()?;

    Some(CalendarEvent {
        id: event.id,
        start,
        summary: event.subject.filter(|s| !s.is_empty()),
    })
}

fn parse_graph_start(start: &GraphDateTime) -> Result<EventTime, String> {
    if let Some(zone) = start.time_zone.as_deref()
        && !zone.eq_ignore_ascii_case("UTC")
    {
        return Err(format!("start is in time zone {:?}, expected UTC", zone));
    }

    NaiveDateTime::parse_from_str(&start.date_time, GRAPH_DATETIME_FORMAT)
        .map(|naive| EventTime::from_utc(naive.and_utc()))
        .map_err(|e| format!("invalid start {:?}: {}", start.date_time, e))
}

/// Response from the calendarView endpoint.
#[derive(Debug, Deserialize)]
struct CalendarViewResponse {
    #[serde(default)]
    value: Vec<GraphEvent>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// A single event from the Graph API.
#[derive(Debug, Deserialize)]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    start: GraphDateTime,
}

/// Graph's `dateTimeTimeZone` resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parse_calendar_view_response() {
        let json = r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users('me')/calendarView(id,subject,start,end)",
            "value": [
                {
                    "@odata.etag": "W/\"abc\"",
                    "id": "AAMkAGI2",
                    "subject": "Flow loop",
                    "start": {"dateTime": "2024-01-01T09:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-01-01T09:30:00.0000000", "timeZone": "UTC"}
                }
            ],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/calendarView?$skip=500"
        }"#;

        let response: CalendarViewResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.value.len(), 1);
        assert!(response.next_link.unwrap().ends_with("$skip=500"));

        let event = convert_event(response.value.into_iter().next().unwrap()).unwrap();
        assert_eq!(event.id, "AAMkAGI2");
        assert_eq!(event.summary.as_deref(), Some("Flow loop"));
        assert_eq!(
            event.start,
            EventTime::from_utc(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn last_page_has_no_next_link() {
        let response: CalendarViewResponse = serde_json::from_str(r#"{"value": []}"#).unwrap();
        assert!(response.next_link.is_none());
        assert!(response.value.is_empty());
    }

    #[test]
    fn fractional_seconds_are_optional() {
        let start = GraphDateTime {
            date_time: "2024-01-01T09:00:00".to_string(),
            time_zone: None,
        };
        assert!(parse_graph_start(&start).is_ok());
    }

    #[test]
    fn non_utc_start_is_rejected() {
        let start = GraphDateTime {
            date_time: "2024-01-01T09:00:00.0000000".to_string(),
            time_zone: Some("Pacific Standard Time".to_string()),
        };
        assert!(parse_graph_start(&start).is_err());
    }

    #[test]
    fn empty_subject_becomes_none() {
        let event = GraphEvent {
            id: "x".to_string(),
            subject: Some(String::new()),
            start: GraphDateTime {
                date_time: "2024-01-01T09:00:00.0000000".to_string(),
                time_zone: Some("UTC".to_string()),
            },
        };
        assert!(convert_event(event).unwrap().summary.is_none());
    }
}
