//! Google authorization command.

use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::{CredentialProvider, CredentialRecord, GoogleCredentials};
use anyhow::Result;

/// Authorize Google access, or just report on the stored token.
pub async fn run_auth(status_only: bool, settings: Settings) -> Result<()> {
    let credentials = GoogleCredentials::new(&settings).with_interactive(!status_only);

    if status_only {
        Output::header("Google credentials");
        Output::kv("Token file", &credentials.token_path().display().to_string());
        match credentials.stored()? {
            Some(record) => print_record(&record),
            None => Output::warning("No token stored. Run 'closer auth' to authorize."),
        }
        return Ok(());
    }

    Output::info("Checking Google credentials...");
    match credentials.obtain().await {
        Ok(record) => {
            Output::success("Google access authorized.");
            print_record(&record);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Authorization failed: {}", e));
            Err(e.into())
        }
    }
}

fn print_record(record: &CredentialRecord) {
    let validity = if record.is_valid() { "valid" } else { "expired" };
    Output::kv("Access token", validity);
    Output::kv(
        "Expires",
        &record
            .expires_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    );
    Output::kv(
        "Refresh token",
        if record.refresh_token.is_some() { "present" } else { "missing" },
    );
    for scope in &record.scopes {
        Output::list_item(scope);
    }
}
