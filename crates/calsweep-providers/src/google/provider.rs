//! Google Calendar provider implementation.
//!
//! This module implements the [`CalendarProvider`] trait for Google Calendar.

use std::time::Duration;

use tracing::{debug, info};

use crate::auth::{AuthPrompt, Authenticator};
use crate::error::{ProviderError, ProviderResult};
use crate::http::build_http_client;
use crate::provider::{
    BoxFuture, CalendarInfo, CalendarProvider, DeleteOutcome, EventPage, EventQuery,
};
use crate::tokens::TokenCache;

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::LoopbackFlow;

const PROVIDER_NAME: &str = "google";

/// Alias Google accepts for the account's main calendar.
const PRIMARY_CALENDAR: &str = "primary";

/// Google Calendar provider.
///
/// Talks to the Calendar API v3 and signs in with the OAuth 2.0 PKCE flow.
#[derive(Debug)]
pub struct GoogleProvider {
    authenticator: Authenticator<LoopbackFlow>,
    client: GoogleCalendarClient,
}

impl GoogleProvider {
    /// Creates a new Google provider with the given configuration.
    ///
    /// Tokens are not read until [`CalendarProvider::authenticate`].
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(PROVIDER_NAME))?;

        let http_client = build_http_client(config.timeout)?;
        let flow = LoopbackFlow::new(&config, http_client.clone());
        let client =
            GoogleCalendarClient::new(http_client, config.api_base.clone(), config.page_size);

        Ok(Self {
            authenticator: Authenticator::new(flow, TokenCache::new(&config.token_path)),
            client,
        })
    }

    /// Returns the token cache used by this provider.
    pub fn token_cache(&self) -> &TokenCache {
        self.authenticator.cache()
    }

    fn tag(err: ProviderError) -> ProviderError {
        err.with_provider(PROVIDER_NAME)
    }

    /// Pages through the calendar list looking for an exact summary match.
    async fn find_calendar(&self, name: &str) -> ProviderResult<CalendarInfo> {
        let token = self.authenticator.access_token().await?;
        let mut page_token: Option<String> = None;
        let mut seen = 0;

        loop {
            let (entries, next) = self
                .client
                .list_calendars_page(&token, page_token.as_deref())
                .await?;
            seen += entries.len();

            if let Some(entry) = entries.into_iter().find(|e| e.summary == name) {
                debug!(calendar_id = %entry.id, "resolved calendar {:?}", name);
                return Ok(CalendarInfo::new(entry.id, entry.summary).with_primary(entry.primary));
            }

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Err(ProviderError::calendar(format!(
            "calendar not found: {:?} (searched {} calendars)",
            name, seen
        )))
    }
}

impl CalendarProvider for GoogleProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authenticate<'a>(&'a self, prompt: &'a dyn AuthPrompt) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.authenticator
                .authenticate(prompt)
                .await
                .map(|_| ())
                .map_err(Self::tag)
        })
    }

    fn is_authenticated(&self) -> bool {
        self.authenticator.is_authenticated()
    }

    fn resolve_calendar<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(async move {
            let calendar = match name {
                None | Some(PRIMARY_CALENDAR) => {
                    CalendarInfo::new(PRIMARY_CALENDAR, PRIMARY_CALENDAR).with_primary(true)
                }
                Some(name) => self.find_calendar(name).await.map_err(Self::tag)?,
            };
            info!("using calendar {:?}", calendar.name);
            Ok(calendar)
        })
    }

    fn fetch_page<'a>(
        &'a self,
        query: &'a EventQuery,
        cursor: Option<String>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>> {
        Box::pin(async move {
            let token = self.authenticator.access_token().await.map_err(Self::tag)?;
            self.client
                .list_events_page(&token, &query.calendar_id, &query.window, cursor.as_deref())
                .await
                .map_err(Self::tag)
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<DeleteOutcome>> {
        Box::pin(async move {
            let token = self.authenticator.access_token().await.map_err(Self::tag)?;
            self.client
                .delete_event(&token, calendar_id, event_id)
                .await
                .map_err(Self::tag)
        })
    }

    fn suggested_delete_interval(&self) -> Duration {
        Duration::from_millis(10)
    }
}
