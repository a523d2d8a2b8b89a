//! CalendarProvider trait, authentication and the sweep pipeline.
//!
//! This crate provides everything between the CLI and the calendar APIs:
//!
//! - [`CalendarProvider`] - The trait both calendar backends implement
//! - [`Authenticator`] / [`TokenCache`] - Token reuse, refresh and sign-in
//! - [`AuthPrompt`] - The interactive half of a sign-in, supplied by the caller
//! - [`run_sweep`] - List every matching event, then delete them one by one
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │ Microsoft Graph │    │ Google Calendar │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌───────────────────┐  ┌─────────────────┐
//! │ MicrosoftProvider │  │ GoogleProvider  │
//! └────────┬──────────┘  └────────┬────────┘
//!          │   CalendarProvider   │
//!          └──────────┬───────────┘
//!                     ▼ find_events()
//!            ┌─────────────────┐
//!            │  CalendarEvent  │
//!            └────────┬────────┘
//!                     ▼ Deleter
//!            ┌─────────────────┐
//!            │   SweepReport   │
//!            └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calsweep_providers::{CalendarProvider, EventQuery, run_sweep};
//!
//! async fn sweep(provider: &dyn CalendarProvider, prompt: &dyn AuthPrompt, window: TimeWindow) {
//!     provider.authenticate(prompt).await?;
//!     let calendar = provider.resolve_calendar(None).await?;
//!     let query = EventQuery::new(calendar.id, window);
//!     let report = run_sweep(provider, &query, |events| println!("found {}", events.len())).await?;
//!     println!("deleted {}", report.deleted);
//! }
//! ```

pub mod auth;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
mod http;
#[cfg(feature = "microsoft")]
pub mod microsoft;
pub mod provider;
pub mod retry;
pub mod sweep;
pub mod tokens;

// Re-export main types at crate root
pub use auth::{
    AuthPrompt, Authenticator, BrowserAuthorization, DeviceCodeChallenge, OAuthFlow,
    RefreshOutcome,
};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    BoxFuture, CalendarEvent, CalendarInfo, CalendarProvider, DeleteOutcome, EventPage, EventQuery,
};
pub use retry::{RetryPolicy, retry_rate_limited};
pub use sweep::{DeleteFailure, Deleter, SweepReport, collect_events, run_sweep};
pub use tokens::{TokenCache, TokenInfo, TokenResponse};
