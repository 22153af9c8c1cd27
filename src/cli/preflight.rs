//! Pre-flight checks before starting a conversation.
//!
//! A missing API key stops the command before any session exists. Missing
//! Google credentials only produce advisories: the product tool still works
//! and the email/calendar tools report the problem themselves.

use crate::config::Settings;
use crate::credentials::TokenStore;
use crate::error::Result;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Terminal chat or one-shot ask.
    Converse,
    /// HTTP chat API. No browser consent is possible mid-request.
    Serve,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Converse | Operation::Serve => {
            settings.api_key()?;
        }
    }
    Ok(())
}

/// Non-fatal problems worth telling the user about.
pub fn advisories(operation: Operation, settings: &Settings) -> Vec<String> {
    let mut notes = Vec::new();

    let secrets = settings.client_secrets_path();
    if !secrets.exists() {
        notes.push(format!(
            "Google client secrets not found at {}. Email and calendar tools will fail.",
            secrets.display()
        ));
    }

    let has_token = TokenStore::new(settings.token_path())
        .load()
        .ok()
        .flatten()
        .is_some();
    if !has_token {
        let hint = match operation {
            Operation::Converse => "A browser window will open the first time a tool needs Google access.",
            Operation::Serve => "Run 'closer auth' before serving; the server cannot ask for consent.",
        };
        notes.push(format!("No Google token stored yet. {}", hint));
    }

    notes
}
