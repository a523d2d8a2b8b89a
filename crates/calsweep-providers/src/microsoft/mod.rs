//! Microsoft Graph (Outlook) calendar provider.
//!
//! # Authentication Flow
//!
//! 1. The user registers an Azure AD app and supplies its client and tenant ids
//! 2. The provider requests a device code and shows it through the prompt
//! 3. The user signs in on any device and enters the code
//! 4. The provider polls the token endpoint until the sign-in completes
//! 5. Tokens are cached; later runs refresh silently
//!
//! # Example
//!
//! ```ignore
//! use calsweep_providers::microsoft::{MicrosoftConfig, MicrosoftCredentials, MicrosoftProvider};
//!
//! let credentials = MicrosoftCredentials::new(client_id, tenant_id);
//! let provider = MicrosoftProvider::new(MicrosoftConfig::new(credentials))?;
//! provider.authenticate(&prompt).await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;

pub use client::GraphClient;
pub use config::{MicrosoftConfig, MicrosoftCredentials};
pub use oauth::DeviceCodeFlow;
pub use provider::MicrosoftProvider;
