//! Microsoft Graph provider implementation.
//!
//! This module implements the [`CalendarProvider`] trait for the signed-in
//! user's default Outlook calendar.

use std::time::Duration;

use tracing::info;

use crate::auth::{AuthPrompt, Authenticator};
use crate::error::{ProviderError, ProviderResult};
use crate::http::build_http_client;
use crate::provider::{
    BoxFuture, CalendarInfo, CalendarProvider, DeleteOutcome, EventPage, EventQuery,
};
use crate::tokens::TokenCache;

use super::client::GraphClient;
use super::config::MicrosoftConfig;
use super::oauth::DeviceCodeFlow;

const PROVIDER_NAME: &str = "microsoft";

/// Id used for the default calendar; Graph routes `/me/events` to it.
const DEFAULT_CALENDAR_ID: &str = "default";

/// Microsoft Graph calendar provider.
#[derive(Debug)]
pub struct MicrosoftProvider {
    authenticator: Authenticator<DeviceCodeFlow>,
    client: GraphClient,
}

impl MicrosoftProvider {
    /// Creates a new provider. Nothing is read or requested yet.
    pub fn new(config: MicrosoftConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(PROVIDER_NAME))?;

        let http_client = build_http_client(config.timeout)?;
        let flow = DeviceCodeFlow::new(&config, http_client.clone());
        let client = GraphClient::new(http_client, config.graph_base.clone(), config.page_size);

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
}

impl CalendarProvider for MicrosoftProvider {
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
            if let Some(name) = name {
                return Err(Self::tag(ProviderError::configuration(format!(
                    "calendar selection ({:?}) is not supported, Microsoft sweeps use the default calendar",
                    name
                ))));
            }
            info!("using the default Outlook calendar");
            Ok(CalendarInfo::new(DEFAULT_CALENDAR_ID, "Calendar").with_primary(true))
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
                .calendar_view_page(&token, &query.window, cursor.as_deref())
                .await
                .map_err(Self::tag)
        })
    }

    fn delete_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<DeleteOutcome>> {
        Box::pin(async move {
            let token = self.authenticator.access_token().await.map_err(Self::tag)?;
            self.client
                .delete_event(&token, event_id)
                .await
                .map_err(Self::tag)
        })
    }

    fn suggested_delete_interval(&self) -> Duration {
        Duration::from_millis(50)
    }
}
