//! Deletes Google Calendar events.

use std::process::ExitCode;

use calsweep_cli::ProviderKind;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    calsweep_cli::main(ProviderKind::Google).await
}
