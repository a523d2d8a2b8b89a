//! Terminal side of interactive sign-ins.

use calsweep_providers::{
    AuthPrompt, BoxFuture, BrowserAuthorization, DeviceCodeChallenge, ProviderResult,
};
use tracing::{debug, warn};

/// Prints sign-in instructions and opens the consent page in a browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl AuthPrompt for ConsolePrompt {
    fn device_code<'a>(
        &'a self,
        challenge: &'a DeviceCodeChallenge,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            println!();
            println!("{}", challenge.instructions());
            println!();
            println!("Waiting for sign-in to complete...");
            Ok(())
        })
    }

    fn browser_authorization<'a>(
        &'a self,
        request: &'a BrowserAuthorization,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            println!();
            println!("Authorize access to your calendar in the browser.");
            println!("If no browser window opens, visit this URL:");
            println!();
            println!("  {}", request.url);
            println!();

            match open::that(&request.url) {
                Ok(()) => debug!("opened consent page in the browser"),
                Err(e) => warn!("could not open a browser: {}", e),
            }
            Ok(())
        })
    }
}
