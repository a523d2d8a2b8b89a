//! Google Calendar provider implementation.
//!
//! This module provides a [`GoogleProvider`] that lists and deletes events
//! through the Google Calendar API v3.
//!
//! # Authentication Flow
//!
//! 1. User provides their own OAuth client ID/secret (required by Google)
//! 2. Provider starts a local HTTP listener on a free port
//! 3. The prompt opens Google's consent page with the PKCE challenge
//! 4. Google redirects to the loopback listener with the authorization code
//! 5. Provider exchanges the code for access and refresh tokens
//! 6. Tokens are cached for future runs
//!
//! # Example
//!
//! ```ignore
//! use calsweep_providers::google::{GoogleConfig, GoogleProvider, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::from_file("credentials.json")?;
//! let provider = GoogleProvider::new(GoogleConfig::new(credentials))?;
//! provider.authenticate(&prompt).await?;
//! let calendar = provider.resolve_calendar(Some("Flows")).await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;

pub use client::{CalendarListEntry, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{LoopbackFlow, PkceChallenge};
pub use provider::GoogleProvider;
